//! Static route classification.
//!
//! Paths are partitioned at startup into three disjoint classes; anything
//! unlisted is public. Lookup is exact-string match: a new protected page
//! must be registered here or it silently ships public. The table is
//! immutable after construction and shared into the middleware.

use std::collections::HashSet;

/// Access policy class for a URL path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Requires a valid principal; otherwise flash + redirect to login.
    Protected,
    /// Login/registration pages; a logged-in caller is bounced to the
    /// dashboard instead.
    UnauthenticatedOnly,
    /// Served to everyone; identity attached when a valid session rides
    /// along.
    Public,
}

/// Redirect target for failed protected-route access and for logout.
pub const LOGIN_PATH: &str = "/auth/login";

/// Redirect target for authenticated callers hitting login pages.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Startup-built partition of known paths.
#[derive(Debug)]
pub struct RouteTable {
    protected: HashSet<String>,
    unauthenticated_only: HashSet<String>,
}

impl RouteTable {
    /// Build a table, rejecting any path listed in both classes. An
    /// overlap is a configuration bug and must fail startup, not be
    /// resolved at request time.
    pub fn new<'a>(
        protected: impl IntoIterator<Item = &'a str>,
        unauthenticated_only: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, RouteTableError> {
        let protected: HashSet<String> = protected.into_iter().map(str::to_string).collect();
        let unauthenticated_only: HashSet<String> =
            unauthenticated_only.into_iter().map(str::to_string).collect();

        if let Some(overlap) = protected.intersection(&unauthenticated_only).next() {
            return Err(RouteTableError {
                path: overlap.clone(),
            });
        }

        Ok(Self {
            protected,
            unauthenticated_only,
        })
    }

    /// The dashboard route sets served by this application.
    pub fn dashboard_defaults() -> Self {
        Self::new(
            [
                "/dashboard",
                "/dashboard/alerts",
                "/dashboard/processes",
                "/dashboard/notifications",
                "/dashboard/users",
                "/dashboard/settings",
            ],
            ["/", "/auth/login", "/auth/register", "/auth/request-access"],
        )
        .expect("default route sets overlap")
    }

    /// Classify a path. Unknown paths are public.
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.protected.contains(path) {
            RouteClass::Protected
        } else if self.unauthenticated_only.contains(path) {
            RouteClass::UnauthenticatedOnly
        } else {
            RouteClass::Public
        }
    }
}

/// A path appeared in more than one route class.
#[derive(Debug)]
pub struct RouteTableError {
    pub path: String,
}

impl std::fmt::Display for RouteTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "path registered in more than one route class: {}", self.path)
    }
}

impl std::error::Error for RouteTableError {}
