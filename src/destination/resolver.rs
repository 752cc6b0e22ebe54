use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::DestinationApi;

/// Grouping entities the resolver creates on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Project,
    Section,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Project => "project",
            Category::Section => "section",
        }
    }

    fn placeholder_prefix(&self) -> char {
        match self {
            Category::Project => 'P',
            Category::Section => 'S',
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How source lists map onto the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListMapping {
    /// One project per list.
    Projects,
    /// One section per list, all inside the named project.
    Sections { project: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{category} {name:?} was not created: destination returned no result")]
    NotCreated { category: Category, name: String },
    #[error("section {0:?} requested but lists are mapped to projects")]
    NoParentProject(String),
    #[error(transparent)]
    Api(#[from] anyhow::Error),
}

#[derive(Debug, Default)]
struct CacheSlice {
    by_name: HashMap<String, String>,
    by_source_id: HashMap<String, String>,
}

/// Destination ids by logical name and by source id, per category.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    projects: CacheSlice,
    sections: CacheSlice,
}

impl ResolutionCache {
    fn slice_mut(&mut self, category: Category) -> &mut CacheSlice {
        match category {
            Category::Project => &mut self.projects,
            Category::Section => &mut self.sections,
        }
    }

    /// Records an entity that already exists in the destination.
    pub fn seed(&mut self, category: Category, name: &str, id: &str) {
        self.slice_mut(category)
            .by_name
            .insert(name.to_string(), id.to_string());
    }

    /// Source id first, then name. A name hit is copied under the source id.
    pub fn lookup(
        &mut self,
        category: Category,
        name: &str,
        source_id: Option<&str>,
    ) -> Option<String> {
        let slice = self.slice_mut(category);
        if let Some(id) = source_id.and_then(|s| slice.by_source_id.get(s)) {
            return Some(id.clone());
        }

        let id = slice.by_name.get(name)?.clone();
        if let Some(source_id) = source_id {
            slice.by_source_id.insert(source_id.to_string(), id.clone());
        }
        Some(id)
    }

    pub fn insert(&mut self, category: Category, name: &str, source_id: Option<&str>, id: &str) {
        let slice = self.slice_mut(category);
        slice.by_name.insert(name.to_string(), id.to_string());
        if let Some(source_id) = source_id {
            slice.by_source_id.insert(source_id.to_string(), id.to_string());
        }
    }
}

/// Finds or creates destination projects and sections, creating each
/// distinct one at most once per process.
pub struct Resolver {
    api: Arc<dyn DestinationApi>,
    cache: ResolutionCache,
    dry_run: bool,
    parent_project: Option<String>,
}

impl Resolver {
    /// Loads existing projects (and the parent project's sections when lists
    /// map to sections) into a fresh cache.
    pub async fn bootstrap(
        api: Arc<dyn DestinationApi>,
        mapping: &ListMapping,
        dry_run: bool,
    ) -> Result<Self, ResolveError> {
        let mut cache = ResolutionCache::default();
        for project in api.projects().await? {
            cache.seed(Category::Project, &project.name, &project.id);
        }

        let mut resolver = Self {
            api,
            cache,
            dry_run,
            parent_project: None,
        };

        if let ListMapping::Sections { project } = mapping {
            let existed = resolver
                .cache
                .lookup(Category::Project, project, None)
                .is_some();
            let project_id = resolver.resolve_project(project, None).await?;
            // A project created just now has no sections yet.
            if existed {
                for section in resolver.api.sections(&project_id).await? {
                    resolver
                        .cache
                        .seed(Category::Section, &section.name, &section.id);
                }
            }
            resolver.parent_project = Some(project_id);
        }

        Ok(resolver)
    }

    pub fn parent_project(&self) -> Option<&str> {
        self.parent_project.as_deref()
    }

    pub async fn resolve_project(
        &mut self,
        name: &str,
        source_id: Option<&str>,
    ) -> Result<String, ResolveError> {
        self.resolve(Category::Project, name, source_id).await
    }

    pub async fn resolve_section(
        &mut self,
        name: &str,
        source_id: Option<&str>,
    ) -> Result<String, ResolveError> {
        if self.parent_project.is_none() {
            return Err(ResolveError::NoParentProject(name.to_string()));
        }
        self.resolve(Category::Section, name, source_id).await
    }

    async fn resolve(
        &mut self,
        category: Category,
        name: &str,
        source_id: Option<&str>,
    ) -> Result<String, ResolveError> {
        if let Some(id) = self.cache.lookup(category, name, source_id) {
            debug!(%category, name = %name, id = %id, "Resolved from cache");
            return Ok(id);
        }

        let id = match self.create(category, name, source_id).await? {
            Some(id) => id,
            None => {
                return Err(ResolveError::NotCreated {
                    category,
                    name: name.to_string(),
                })
            }
        };
        self.cache.insert(category, name, source_id, &id);
        Ok(id)
    }

    async fn create(
        &self,
        category: Category,
        name: &str,
        source_id: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        if self.dry_run {
            let id = placeholder(category, name, source_id);
            info!(%category, name = %name, id = %id, "Dry run: would create");
            return Ok(Some(id));
        }

        let id = match category {
            Category::Project => self.api.create_project(name).await?.map(|p| p.id),
            Category::Section => {
                let Some(project_id) = self.parent_project.as_deref() else {
                    return Ok(None);
                };
                self.api
                    .create_section(name, project_id)
                    .await?
                    .map(|s| s.id)
            }
        };

        if let Some(id) = &id {
            info!(%category, name = %name, id = %id, "Created");
        }
        Ok(id)
    }
}

fn placeholder(category: Category, name: &str, source_id: Option<&str>) -> String {
    format!("{}{}", category.placeholder_prefix(), source_id.unwrap_or(name))
}
