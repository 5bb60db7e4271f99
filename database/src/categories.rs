use crate::models::{CategoryCountRow, CategoryRow};
use crate::Database;
use explorer_core::{Category, CategoryCount, CoreError, DatabaseError, DEFAULT_CATEGORY};
use tracing::info;

fn clean_name(name: &str) -> Result<&str, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::InvalidInput {
            message: "category name must not be empty".to_string(),
        });
    }
    Ok(name)
}

fn ensure_not_default(name: &str) -> Result<(), CoreError> {
    if name == DEFAULT_CATEGORY {
        return Err(DatabaseError::ProtectedCategory {
            name: name.to_string(),
        }
        .into());
    }
    Ok(())
}

impl Database {
    /// Adds a category; returns false if it already exists.
    pub async fn add_category(&self, name: &str) -> Result<bool, CoreError> {
        let name = clean_name(name)?;
        let result = sqlx::query("INSERT OR IGNORE INTO categories (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        let added = result.rows_affected() > 0;
        if added {
            info!("Added category '{}'", name);
        }
        Ok(added)
    }

    pub async fn category_exists(&self, name: &str) -> Result<bool, CoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM categories WHERE name = ?")
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// All categories ordered by name, with their descriptions.
    pub async fn list_categories(&self) -> Result<Vec<Category>, CoreError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Number of visible saved posts per category, including empty ones.
    pub async fn category_counts(&self) -> Result<Vec<CategoryCount>, CoreError> {
        let rows = sqlx::query_as::<_, CategoryCountRow>(
            r"
            SELECT c.name AS name, COUNT(p.id) AS count
            FROM categories c
            LEFT JOIN saved_posts p
                ON p.category = c.name AND p.show_in_categories = 1
            GROUP BY c.id, c.name
            ORDER BY c.name
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CategoryCount::from).collect())
    }

    /// Sets a category's description; a blank description clears it.
    pub async fn set_category_description(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(), CoreError> {
        let description = Some(description.trim()).filter(|d| !d.is_empty());
        let result = sqlx::query("UPDATE categories SET description = ? WHERE name = ?")
            .bind(description)
            .bind(name.trim())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                resource: format!("category '{}'", name.trim()),
            });
        }
        Ok(())
    }

    /// Renames a category and every post filed under it. Returns the number
    /// of posts updated.
    pub async fn rename_category(&self, old_name: &str, new_name: &str) -> Result<u64, CoreError> {
        let old_name = clean_name(old_name)?;
        let new_name = clean_name(new_name)?;
        ensure_not_default(old_name)?;
        if new_name == DEFAULT_CATEGORY {
            return Err(DatabaseError::ConstraintViolation {
                constraint: format!("'{}' is reserved", DEFAULT_CATEGORY),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let renamed = sqlx::query("UPDATE categories SET name = ? WHERE name = ?")
            .bind(new_name)
            .bind(old_name)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if renamed == 0 {
            return Err(CoreError::NotFound {
                resource: format!("category '{}'", old_name),
            });
        }

        let moved = sqlx::query("UPDATE saved_posts SET category = ? WHERE category = ?")
            .bind(new_name)
            .bind(old_name)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        info!(
            "Renamed category '{}' to '{}' ({} posts)",
            old_name, new_name, moved
        );
        Ok(moved)
    }

    /// Deletes a category, moving its posts to the default category. Returns
    /// the number of posts moved.
    pub async fn remove_category(&self, name: &str) -> Result<u64, CoreError> {
        let name = clean_name(name)?;
        ensure_not_default(name)?;

        let mut tx = self.pool.begin().await?;

        let moved = sqlx::query("UPDATE saved_posts SET category = ? WHERE category = ?")
            .bind(DEFAULT_CATEGORY)
            .bind(name)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM categories WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(CoreError::NotFound {
                resource: format!("category '{}'", name),
            });
        }

        tx.commit().await?;
        info!("Removed category '{}', moved {} posts to {}", name, moved, DEFAULT_CATEGORY);
        Ok(moved)
    }

    /// Moves every post in a category back to the default category.
    pub async fn uncategorize_posts(&self, name: &str) -> Result<u64, CoreError> {
        let name = clean_name(name)?;
        if !self.category_exists(name).await? {
            return Err(CoreError::NotFound {
                resource: format!("category '{}'", name),
            });
        }

        let moved = sqlx::query("UPDATE saved_posts SET category = ? WHERE category = ?")
            .bind(DEFAULT_CATEGORY)
            .bind(name)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(moved)
    }
}
