//! Catalog service: category tree, bibliographic entries and copies

use std::collections::HashMap;
use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        catalog::{normalize_isbn, CatalogCategoryLink, CatalogEntry, CreateCatalogEntry, UpdateCatalogEntry},
        category::{Category, CategoryNode, CreateCategory, UpdateCategory},
        copy::{BookCopy, CopyQuery, CreateCopy},
        enums::CopyState,
        loan::LoanQuery,
        operation_log::AuditEntry,
    },
    repository::Repository,
    services::audit::{self, AuditSink},
};

/// Would hanging `id` under `new_parent` close a loop?
fn creates_cycle(categories: &[Category], id: i64, new_parent: i64) -> bool {
    let parents: HashMap<i64, Option<i64>> =
        categories.iter().map(|c| (c.id, c.parent_id)).collect();

    let mut cursor = Some(new_parent);
    let mut steps = 0;
    while let Some(current) = cursor {
        if current == id {
            return true;
        }
        steps += 1;
        if steps > parents.len() {
            // the stored tree already loops
            return true;
        }
        cursor = parents.get(&current).copied().flatten();
    }
    false
}

fn build_tree(categories: Vec<Category>) -> Vec<CategoryNode> {
    let mut children: HashMap<Option<i64>, Vec<Category>> = HashMap::new();
    for category in categories {
        children.entry(category.parent_id).or_default().push(category);
    }

    fn attach(parent: Option<i64>, children: &mut HashMap<Option<i64>, Vec<Category>>) -> Vec<CategoryNode> {
        let level = children.remove(&parent).unwrap_or_default();
        level
            .into_iter()
            .map(|category| {
                let subcategories = attach(Some(category.id), children);
                CategoryNode {
                    category,
                    subcategories,
                }
            })
            .collect()
    }

    attach(None, &mut children)
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    audit: Arc<dyn AuditSink>,
}

impl CatalogService {
    pub fn new(repository: Repository, audit: Arc<dyn AuditSink>) -> Self {
        Self { repository, audit }
    }

    async fn audit(&self, entry: AuditEntry) {
        audit::emit(self.audit.as_ref(), entry).await;
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    pub async fn create_category(&self, category: CreateCategory, actor: Option<i64>) -> AppResult<Category> {
        category.validate()?;

        let mut tx = self.repository.begin().await?;
        if let Some(parent_id) = category.parent_id {
            tx.get_category(parent_id).await?;
        }
        let category = tx.insert_category(&category).await?;
        tx.commit().await?;

        self.audit(AuditEntry::new(
            "categorias",
            "create",
            format!("Category {} ({})", category.id, category.name),
            actor,
        ))
        .await;
        Ok(category)
    }

    pub async fn get_category(&self, id: i64) -> AppResult<Category> {
        let mut tx = self.repository.begin().await?;
        tx.get_category(id).await
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let mut tx = self.repository.begin().await?;
        tx.list_categories().await
    }

    /// Whole category forest, roots first
    pub async fn category_tree(&self) -> AppResult<Vec<CategoryNode>> {
        Ok(build_tree(self.list_categories().await?))
    }

    /// Rename or move a category; moving under one of its own descendants
    /// is refused.
    pub async fn update_category(&self, id: i64, update: UpdateCategory, actor: Option<i64>) -> AppResult<Category> {
        update.validate()?;

        let mut tx = self.repository.begin().await?;
        let mut category = tx.get_category(id).await?;

        if let Some(name) = update.name {
            category.name = name;
        }
        if let Some(description) = update.description {
            category.description = Some(description);
        }
        if let Some(parent_id) = update.parent_id {
            if let Some(parent) = parent_id {
                tx.get_category(parent).await?;
                let all = tx.list_categories().await?;
                if creates_cycle(&all, id, parent) {
                    return Err(AppError::ConstraintViolation(format!(
                        "Moving category {} under {} would create a cycle",
                        id, parent
                    )));
                }
            }
            category.parent_id = parent_id;
        }

        let category = tx.update_category(&category).await?;
        tx.commit().await?;

        self.audit(AuditEntry::new(
            "categorias",
            "update",
            format!("Category {} ({})", category.id, category.name),
            actor,
        ))
        .await;
        Ok(category)
    }

    /// Refused while subcategories or catalog links exist
    pub async fn delete_category(&self, id: i64, actor: Option<i64>) -> AppResult<()> {
        let mut tx = self.repository.begin().await?;
        let category = tx.get_category(id).await?;

        let all = tx.list_categories().await?;
        let children = all.iter().filter(|c| c.parent_id == Some(id)).count();
        if children > 0 {
            return Err(AppError::ConstraintViolation(format!(
                "Category {} still has {} subcategories",
                category.name, children
            )));
        }

        tx.delete_category(id).await?;
        tx.commit().await?;

        self.audit(AuditEntry::new(
            "categorias",
            "delete",
            format!("Category {} ({})", id, category.name),
            actor,
        ))
        .await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Catalog entries
    // -----------------------------------------------------------------------

    pub async fn create_entry(&self, mut entry: CreateCatalogEntry, actor: Option<i64>) -> AppResult<CatalogEntry> {
        entry.isbn = entry.isbn.as_deref().map(normalize_isbn).filter(|s| !s.is_empty());
        entry.validate()?;

        let mut tx = self.repository.begin().await?;
        let entry = tx.insert_entry(&entry).await?;
        tx.commit().await?;

        tracing::info!(entry_id = entry.id, title = %entry.title, "Catalog entry created");
        self.audit(AuditEntry::new(
            "livros_base",
            "create",
            format!("Entry {} ({})", entry.id, entry.title),
            actor,
        ))
        .await;
        Ok(entry)
    }

    pub async fn get_entry(&self, id: i64) -> AppResult<CatalogEntry> {
        let mut tx = self.repository.begin().await?;
        tx.get_entry(id).await
    }

    pub async fn list_entries(&self) -> AppResult<Vec<CatalogEntry>> {
        let mut tx = self.repository.begin().await?;
        tx.list_entries().await
    }

    pub async fn update_entry(&self, id: i64, mut update: UpdateCatalogEntry, actor: Option<i64>) -> AppResult<CatalogEntry> {
        update.isbn = update.isbn.as_deref().map(normalize_isbn);
        if update.isbn.as_deref() == Some("") {
            update.isbn = None;
        }
        update.validate()?;

        let mut tx = self.repository.begin().await?;
        let mut entry = tx.get_entry(id).await?;
        if let Some(title) = update.title {
            entry.title = title;
        }
        if let Some(author) = update.author {
            entry.author = author;
        }
        if let Some(synopsis) = update.synopsis {
            entry.synopsis = Some(synopsis);
        }
        if let Some(isbn) = update.isbn {
            entry.isbn = Some(isbn);
        }
        if let Some(cover_url) = update.cover_url {
            entry.cover_url = Some(cover_url);
        }
        let entry = tx.update_entry(&entry).await?;
        tx.commit().await?;

        self.audit(AuditEntry::new(
            "livros_base",
            "update",
            format!("Entry {} ({})", entry.id, entry.title),
            actor,
        ))
        .await;
        Ok(entry)
    }

    /// Refused while copies or category links exist
    pub async fn delete_entry(&self, id: i64, actor: Option<i64>) -> AppResult<()> {
        let mut tx = self.repository.begin().await?;
        let entry = tx.get_entry(id).await?;

        let copies = tx
            .list_copies(&CopyQuery {
                entry_id: Some(id),
                state: None,
            })
            .await?;
        if !copies.is_empty() {
            return Err(AppError::ConstraintViolation(format!(
                "Entry {} still has {} copies",
                entry.title,
                copies.len()
            )));
        }

        tx.delete_entry(id).await?;
        tx.commit().await?;

        self.audit(AuditEntry::new(
            "livros_base",
            "delete",
            format!("Entry {} ({})", id, entry.title),
            actor,
        ))
        .await;
        Ok(())
    }

    pub async fn link_category(&self, entry_id: i64, category_id: i64, actor: Option<i64>) -> AppResult<CatalogCategoryLink> {
        let mut tx = self.repository.begin().await?;
        tx.get_entry(entry_id).await?;
        tx.get_category(category_id).await?;
        let link = tx.link_category(entry_id, category_id).await?;
        tx.commit().await?;

        self.audit(AuditEntry::new(
            "livro_categoria",
            "create",
            format!("Entry {} filed under category {}", entry_id, category_id),
            actor,
        ))
        .await;
        Ok(link)
    }

    pub async fn unlink_category(&self, entry_id: i64, category_id: i64, actor: Option<i64>) -> AppResult<()> {
        let mut tx = self.repository.begin().await?;
        tx.unlink_category(entry_id, category_id).await?;
        tx.commit().await?;

        self.audit(AuditEntry::new(
            "livro_categoria",
            "delete",
            format!("Entry {} removed from category {}", entry_id, category_id),
            actor,
        ))
        .await;
        Ok(())
    }

    pub async fn entry_categories(&self, entry_id: i64) -> AppResult<Vec<Category>> {
        let mut tx = self.repository.begin().await?;
        tx.get_entry(entry_id).await?;
        tx.list_entry_categories(entry_id).await
    }

    // -----------------------------------------------------------------------
    // Copies
    // -----------------------------------------------------------------------

    pub async fn create_copy(&self, copy: CreateCopy, actor: Option<i64>) -> AppResult<BookCopy> {
        copy.validate()?;

        let mut tx = self.repository.begin().await?;
        let entry = tx.get_entry(copy.entry_id).await?;
        let copy = tx.insert_copy(entry.id, copy.code.trim()).await?;
        tx.commit().await?;

        tracing::info!(copy_id = copy.id, code = %copy.code, entry_id = entry.id, "Copy created");
        self.audit(AuditEntry::new(
            "livros",
            "create",
            format!("Copy {} of entry {} ({})", copy.code, entry.id, entry.title),
            actor,
        ))
        .await;
        Ok(copy)
    }

    pub async fn get_copy(&self, id: i64) -> AppResult<BookCopy> {
        let mut tx = self.repository.begin().await?;
        tx.get_copy(id).await
    }

    /// Copies by catalog entry and state
    pub async fn list_copies(&self, query: &CopyQuery) -> AppResult<Vec<BookCopy>> {
        let mut tx = self.repository.begin().await?;
        tx.list_copies(query).await
    }

    /// Take an available copy out of circulation (damaged, lost, in repair)
    pub async fn withdraw_copy(&self, id: i64, actor: Option<i64>) -> AppResult<BookCopy> {
        let mut tx = self.repository.begin().await?;
        let copy = tx.lock_copy(id).await?;
        if copy.state != CopyState::Available {
            return Err(AppError::CopyUnavailable(format!(
                "Copy {} is {}, only available copies can be withdrawn",
                copy.code, copy.state
            )));
        }
        let copy = tx.set_copy_state(id, CopyState::Unavailable).await?;
        tx.commit().await?;

        self.audit(AuditEntry::new(
            "livros",
            "withdraw",
            format!("Copy {} withdrawn from circulation", copy.code),
            actor,
        ))
        .await;
        Ok(copy)
    }

    /// Put a withdrawn copy back into circulation
    pub async fn reinstate_copy(&self, id: i64, actor: Option<i64>) -> AppResult<BookCopy> {
        let mut tx = self.repository.begin().await?;
        let copy = tx.lock_copy(id).await?;
        if copy.state != CopyState::Unavailable {
            return Err(AppError::InvalidState(format!(
                "Copy {} is {}, expected unavailable",
                copy.code, copy.state
            )));
        }
        let loans = tx
            .list_loans(&LoanQuery {
                copy_id: Some(id),
                ..Default::default()
            })
            .await?;
        if loans.iter().any(|l| l.is_open()) {
            return Err(AppError::InvalidState(format!(
                "Copy {} is out on loan",
                copy.code
            )));
        }
        let copy = tx.set_copy_state(id, CopyState::Available).await?;
        tx.commit().await?;

        self.audit(AuditEntry::new(
            "livros",
            "reinstate",
            format!("Copy {} back in circulation", copy.code),
            actor,
        ))
        .await;
        Ok(copy)
    }

    /// Refused while any reservation or loan references the copy
    pub async fn delete_copy(&self, id: i64, actor: Option<i64>) -> AppResult<()> {
        let mut tx = self.repository.begin().await?;
        let copy = tx.get_copy(id).await?;
        tx.delete_copy(id).await?;
        tx.commit().await?;

        self.audit(AuditEntry::new(
            "livros",
            "delete",
            format!("Copy {}", copy.code),
            actor,
        ))
        .await;
        Ok(())
    }
}
