//! Write classification.
//!
//! A request is a write when any configured write route matches it. Write
//! routes are compiled once at startup from [`WriteRouteConfig`]; methods
//! were validated by config validation, so unparsable entries are skipped.

use axum::body::Body;
use axum::http::{Method, Request};

use crate::config::WriteRouteConfig;
use crate::routing::matcher::{AndMatcher, Matcher, MethodMatcher, PathPrefixMatcher};

/// Decides which requests belong to the writer node.
#[derive(Debug)]
pub struct WriteClassifier {
    routes: Vec<AndMatcher>,
}

impl WriteClassifier {
    pub fn from_config(routes: &[WriteRouteConfig]) -> Self {
        let routes = routes
            .iter()
            .map(|route| {
                let methods = route
                    .methods
                    .iter()
                    .filter_map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok())
                    .collect();
                AndMatcher::new(vec![
                    Box::new(PathPrefixMatcher::new(route.path_prefix.clone())),
                    Box::new(MethodMatcher::new(methods)),
                ])
            })
            .collect();

        Self { routes }
    }

    /// A classifier that never forwards.
    pub fn none() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn is_write(&self, req: &Request<Body>) -> bool {
        self.routes.iter().any(|route| route.matches(req))
    }
}
