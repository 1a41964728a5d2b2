//! Job catalog and search
//!
//! Holds the immutable set of WIL job postings served by the MCP tools,
//! along with the employer and job-title reference lists.


use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// A single job posting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub program_area: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Duplicate job id: {0}")]
    DuplicateId(String),
    #[error("Job at position {0} has an empty id")]
    EmptyId(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// On-disk layout of a catalog file
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    employers: Vec<String>,
    #[serde(default)]
    job_titles: Vec<String>,
    #[serde(default)]
    jobs: Vec<JobRecord>,
}

/// Immutable collection of job postings and reference lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    jobs: Vec<JobRecord>,
    employers: Vec<String>,
    job_titles: Vec<String>,
}

/// Search criteria for [`Catalog::search`]
///
/// Empty keyword lists and empty strings place no constraint on the results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub keywords: Vec<String>,
    pub location: Option<String>,
    pub program: Option<String>,
}

impl Catalog {
    /// Build a catalog, rejecting empty or duplicate job ids
    #[inline]
    pub fn new(
        jobs: Vec<JobRecord>,
        employers: Vec<String>,
        job_titles: Vec<String>,
    ) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(jobs.len());
        for (position, job) in jobs.iter().enumerate() {
            if job.id.is_empty() {
                return Err(CatalogError::EmptyId(position));
            }
            if !seen.insert(job.id.as_str()) {
                return Err(CatalogError::DuplicateId(job.id.clone()));
            }
        }

        Ok(Self {
            jobs,
            employers,
            job_titles,
        })
    }

    /// The catalog served when no catalog file is configured
    #[inline]
    pub fn builtin() -> Self {
        Self {
            jobs: vec![
                JobRecord {
                    id: "job2".to_string(),
                    title: "QA Analyst Co-op".to_string(),
                    company: "Finance Corp".to_string(),
                    location: "Remote".to_string(),
                    description: "Seeking a QA co-op student for testing financial software. Experience with Selenium is a plus.".to_string(),
                    program_area: "Computer Programming and Analysis".to_string(),
                    keywords: to_strings(&["qa", "testing", "selenium", "finance", "co-op"]),
                },
                JobRecord {
                    id: "job3".to_string(),
                    title: "Application Developer WIL".to_string(),
                    company: "Healthcare Innovations".to_string(),
                    location: "Toronto, ON".to_string(),
                    description: "Develop and maintain healthcare applications using C# and.NET."
                        .to_string(),
                    program_area: "Computer Programming and Analysis".to_string(),
                    keywords: to_strings(&["c#", ".net", "application developer", "wil"]),
                },
            ],
            employers: to_strings(&[
                "CIBC",
                "RBC",
                "TD",
                "Manulife Financial",
                "Canadian Tire Corporation",
                "NexJ Systems Inc.",
            ]),
            job_titles: to_strings(&[
                "Junior Systems Developer",
                "Software Engineer",
                "Programmer/Analyst",
                "Testing Specialist",
                "Application Developer",
                "Quality Assurance Analyst",
            ]),
        }
    }

    /// Parse a catalog from TOML text
    #[inline]
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::new(file.jobs, file.employers, file.job_titles)
    }

    /// Load a catalog from a TOML file
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    #[inline]
    pub fn jobs(&self) -> &[JobRecord] {
        &self.jobs
    }

    #[inline]
    pub fn employers(&self) -> &[String] {
        &self.employers
    }

    #[inline]
    pub fn job_titles(&self) -> &[String] {
        &self.job_titles
    }

    /// Return the jobs matching every supplied criterion, in catalog order
    #[inline]
    pub fn search(&self, query: &JobQuery) -> Vec<&JobRecord> {
        if query.is_empty() {
            return self.jobs.iter().collect();
        }

        let matcher = query.prepare();
        self.jobs.iter().filter(|job| matcher.matches(job)).collect()
    }

    /// Find a job by exact id; the first match wins
    #[inline]
    pub fn find(&self, job_id: &str) -> Option<&JobRecord> {
        self.jobs.iter().find(|job| job.id == job_id)
    }
}

impl Default for Catalog {
    #[inline]
    fn default() -> Self {
        Self::builtin()
    }
}

impl JobQuery {
    /// True when no criterion would constrain the results
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
            && self.location.as_deref().is_none_or(str::is_empty)
            && self.program.as_deref().is_none_or(str::is_empty)
    }

    fn prepare(&self) -> PreparedQuery {
        PreparedQuery {
            keywords: self.keywords.iter().map(|k| k.to_lowercase()).collect(),
            location: lowered_criterion(self.location.as_deref()),
            program: lowered_criterion(self.program.as_deref()),
        }
    }
}

/// Lower-cased criteria, computed once per search
struct PreparedQuery {
    keywords: Vec<String>,
    location: Option<String>,
    program: Option<String>,
}

impl PreparedQuery {
    fn matches(&self, job: &JobRecord) -> bool {
        if !self.keywords.is_empty() {
            let title = job.title.to_lowercase();
            let description = job.description.to_lowercase();
            let keywords = job.keywords.join(" ").to_lowercase();
            let any_keyword = self.keywords.iter().any(|k| {
                title.contains(k.as_str())
                    || description.contains(k.as_str())
                    || keywords.contains(k.as_str())
            });
            if !any_keyword {
                return false;
            }
        }

        if let Some(location) = &self.location
            && !job.location.to_lowercase().contains(location.as_str())
        {
            return false;
        }

        if let Some(program) = &self.program
            && !job.program_area.to_lowercase().contains(program.as_str())
        {
            return false;
        }

        true
    }
}

fn lowered_criterion(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_lowercase)
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}
