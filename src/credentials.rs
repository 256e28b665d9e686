//! Account credentials.

use std::fmt;

/// Project (tenant) a Keystone token is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectScope {
    Id(String),
    Name(String),
}

/// Login credentials for the identity endpoint.
///
/// The password is never exposed in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    user: String,
    password: String,
    domain: Option<String>,
    project: Option<ProjectScope>,
}

impl Credentials {
    /// Create credentials from a user id (or name) and password
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            domain: None,
            project: None,
        }
    }

    /// Identify the user by name within a domain instead of by id (v3 only)
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Scope tokens to a project
    pub fn with_project(mut self, project: ProjectScope) -> Self {
        self.project = Some(project);
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn project(&self) -> Option<&ProjectScope> {
        self.project.as_ref()
    }

    /// Only for building authentication requests.
    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("project", &self.project)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::new("12345_user", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("12345_user"));
        assert!(!debug.contains("hunter2"));
    }
}
