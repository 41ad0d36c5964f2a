//! Route templates compiled to anchored regular expressions.
//!
//! Matching is two-phase: the first pattern, in registration order, whose shape
//! matches the path is the only one consulted for the method. A path matching a
//! pattern that lacks the method is `MethodNotAllowed` even when a later
//! pattern would accept both.

use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::RouterBuildError;
use crate::request::PathVars;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(.*?)\}").expect("placeholder regex is valid"));

/// A template turned into a regex source plus its variable names, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    pub pattern: String,
    pub names: Vec<String>,
}

/// Replaces every `{name}` with a capture group and escapes the rest.
pub fn compile_template(template: &str) -> CompiledTemplate {
    let mut pattern = String::with_capacity(template.len() + 8);
    let mut names = Vec::new();
    let mut last = 0;

    pattern.push('^');
    for captures in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        pattern.push_str(&regex::escape(&template[last..whole.start()]));
        pattern.push_str("(.*?)");
        names.push(name.as_str().to_owned());
        last = whole.end();
    }
    pattern.push_str(&regex::escape(&template[last..]));
    pattern.push('$');

    CompiledTemplate { pattern, names }
}

#[derive(Debug)]
struct MethodRoute<T> {
    method: Method,
    names: Vec<String>,
    value: T,
}

#[derive(Debug)]
struct PatternRoutes<T> {
    regex: Regex,
    routes: Vec<MethodRoute<T>>,
}

/// Outcome of looking a request up.
#[derive(Debug)]
pub enum Resolution<'t, T> {
    Found { route: &'t T, vars: PathVars },
    MethodNotAllowed,
    NotFound,
}

/// Routes grouped by compiled pattern, in first registration order.
#[derive(Debug)]
pub struct RouteTable<T> {
    patterns: Vec<PatternRoutes<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self { patterns: Vec::new() }
    }
}

impl<T> RouteTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route. A second route with the same method and compiled pattern
    /// is rejected.
    pub fn register(&mut self, method: Method, template: &str, value: T) -> Result<(), RouterBuildError> {
        let CompiledTemplate { pattern, names } = compile_template(template);

        let index = match self.patterns.iter().position(|routes| routes.regex.as_str() == pattern) {
            Some(index) => index,
            None => {
                let regex = Regex::new(&pattern)
                    .map_err(|source| RouterBuildError::InvalidTemplate { template: template.to_owned(), source })?;
                self.patterns.push(PatternRoutes { regex, routes: Vec::new() });
                self.patterns.len() - 1
            }
        };

        let routes = &mut self.patterns[index].routes;
        if routes.iter().any(|route| route.method == method) {
            return Err(RouterBuildError::DuplicateRoute { method, template: template.to_owned() });
        }
        routes.push(MethodRoute { method, names, value });
        Ok(())
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Resolution<'_, T> {
        let Some((routes, captures)) =
            self.patterns.iter().find_map(|routes| routes.regex.captures(path).map(|captures| (routes, captures)))
        else {
            return Resolution::NotFound;
        };

        let Some(route) = routes.routes.iter().find(|route| &route.method == method) else {
            return Resolution::MethodNotAllowed;
        };

        let mut vars = PathVars::empty();
        for (name, value) in route.names.iter().zip(captures.iter().skip(1)) {
            vars.push(name, value.map_or("", |value| value.as_str()));
        }
        Resolution::Found { route: &route.value, vars }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Number of (method, pattern) routes.
    pub fn len(&self) -> usize {
        self.patterns.iter().map(|routes| routes.routes.len()).sum()
    }
}
