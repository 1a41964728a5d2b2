//! MCP Resources Implementation
//!
//! Static reference lists served from the job catalog.

use crate::catalog::Catalog;
use crate::mcp::protocol::*;
use crate::mcp::server::ResourceHandler;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub const EMPLOYERS_URI: &str = "mcp://jobAgent/wil/employers";
pub const JOB_TITLES_URI: &str = "mcp://jobAgent/wil/job_titles";

const JSON_MIME_TYPE: &str = "application/json";

/// Which reference list a [`ReferenceListHandler`] serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceList {
    Employers,
    JobTitles,
}

/// Serves one of the catalog's reference lists as a JSON array
pub struct ReferenceListHandler {
    catalog: Arc<Catalog>,
    list: ReferenceList,
}

impl ReferenceList {
    #[inline]
    pub fn uri(self) -> &'static str {
        match self {
            Self::Employers => EMPLOYERS_URI,
            Self::JobTitles => JOB_TITLES_URI,
        }
    }

    fn values(self, catalog: &Catalog) -> &[String] {
        match self {
            Self::Employers => catalog.employers(),
            Self::JobTitles => catalog.job_titles(),
        }
    }
}

impl ReferenceListHandler {
    #[inline]
    pub fn new(catalog: Arc<Catalog>, list: ReferenceList) -> Self {
        Self { catalog, list }
    }

    /// Create the resource definition for this list
    #[inline]
    pub fn resource_definition(&self) -> Resource {
        let (name, description) = match self.list {
            ReferenceList::Employers => (
                "get_wil_employers_resource",
                "Provides a list of common WIL program employers.",
            ),
            ReferenceList::JobTitles => (
                "get_wil_job_titles_resource",
                "Provides a list of common WIL program job titles.",
            ),
        };

        Resource {
            uri: self.list.uri().to_string(),
            name: name.to_string(),
            description: Some(description.to_string()),
            mime_type: Some(JSON_MIME_TYPE.to_string()),
        }
    }
}

#[async_trait]
impl ResourceHandler for ReferenceListHandler {
    #[inline]
    async fn handle(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        let text = serde_json::to_string(self.list.values(&self.catalog))?;
        Ok(vec![ResourceContents {
            uri: uri.to_string(),
            mime_type: Some(JSON_MIME_TYPE.to_string()),
            text,
        }])
    }
}
