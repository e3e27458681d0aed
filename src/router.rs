//! The request router: a prefix tree over path segments with
//! static-before-dynamic match priority (§3, §4.6).

use std::collections::HashMap;

use crate::config::TrailingSlashPolicy;
use crate::error::{CoreError, DiagnosticId, DispatchError, Result};

/// `(method, path_template, handler_descriptor)` — here the descriptor is
/// represented by its name, a key into the dispatcher's handler registry
/// (§3).
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub method: String,
    pub path_template: String,
    pub handler_name: String,
}

#[derive(Default)]
struct Node {
    static_children: HashMap<String, Node>,
    dynamic_child: Option<(String, Box<Node>)>,
    /// method -> (handler name, the template that registered it, for
    /// ambiguity diagnostics)
    handlers: HashMap<String, (String, String)>,
}

impl Node {
    fn child_for_segment(&mut self, segment: &str) -> Result<&mut Node> {
        if let Some(name) = dynamic_name(segment) {
            match &self.dynamic_child {
                None => {
                    self.dynamic_child = Some((name.to_string(), Box::new(Node::default())));
                }
                Some((existing, _)) if existing != name => {
                    return Err(CoreError::Dispatch(DispatchError::AmbiguousRoute {
                        method: String::new(),
                        path_template: format!("conflicting placeholder names: {{{existing}}} vs {{{name}}}"),
                        diagnostic_id: DiagnosticId::next(),
                    }));
                }
                Some(_) => {}
            }
            Ok(&mut self.dynamic_child.as_mut().unwrap().1)
        } else {
            Ok(self.static_children.entry(segment.to_string()).or_default())
        }
    }
}

fn dynamic_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('{').and_then(|s| s.strip_suffix('}'))
}

/// Outcome of a successful or near-successful route match (§4.6).
pub enum MatchOutcome<'a> {
    Matched { handler_name: &'a str, path_params: HashMap<String, String> },
    /// `route_trailing_slash = redirect`: the normalized path matched but
    /// the request path did not.
    Redirect { location: String },
    NotFound,
    MethodNotAllowed { allowed: Vec<String> },
}

/// Built once at `refresh` and treated as read-only for the container's
/// lifetime (§3).
pub struct Router {
    root: Node,
    case_sensitive: bool,
    trailing_slash: TrailingSlashPolicy,
}

impl Router {
    pub fn new(case_sensitive: bool, trailing_slash: TrailingSlashPolicy) -> Self {
        Self { root: Node::default(), case_sensitive, trailing_slash }
    }

    /// Insert one route. Fails with `AmbiguousRoute` if an identical
    /// `(method, path_template)` is already registered, or if two routes at
    /// the same tree position declare differently-named placeholders (§4.6).
    pub fn register(&mut self, entry: RouteEntry) -> Result<()> {
        let segments = split_path(&entry.path_template);
        let mut node = &mut self.root;
        for segment in &segments {
            node = node.child_for_segment(segment).map_err(|e| {
                if let CoreError::Dispatch(DispatchError::AmbiguousRoute { path_template, diagnostic_id, .. }) = e {
                    CoreError::Dispatch(DispatchError::AmbiguousRoute {
                        method: entry.method.clone(),
                        path_template: format!("{}: {}", entry.path_template, path_template),
                        diagnostic_id,
                    })
                } else {
                    e
                }
            })?;
        }

        if node.handlers.contains_key(&entry.method) {
            return Err(CoreError::Dispatch(DispatchError::AmbiguousRoute {
                method: entry.method,
                path_template: entry.path_template,
                diagnostic_id: DiagnosticId::next(),
            }));
        }

        node.handlers.insert(entry.method, (entry.handler_name, entry.path_template));
        Ok(())
    }

    pub fn match_route(&self, method: &str, path: &str) -> MatchOutcome<'_> {
        match self.trailing_slash {
            TrailingSlashPolicy::Strict => self.match_exact(method, path),
            TrailingSlashPolicy::Ignore => self.match_exact(method, &normalize_trailing_slash(path)),
            TrailingSlashPolicy::Redirect => {
                let direct = self.match_exact(method, path);
                if matches!(direct, MatchOutcome::NotFound) {
                    let toggled = toggle_trailing_slash(path);
                    if let MatchOutcome::Matched { .. } = self.match_exact(method, &toggled) {
                        return MatchOutcome::Redirect { location: toggled };
                    }
                }
                direct
            }
        }
    }

    fn match_exact(&self, method: &str, path: &str) -> MatchOutcome<'_> {
        let segments = split_path(path);
        let mut params = HashMap::new();
        match self.descend(&self.root, &segments, 0, &mut params) {
            Some(node) => match node.handlers.get(method) {
                Some((handler_name, _)) => MatchOutcome::Matched { handler_name, path_params: params },
                None => {
                    let mut allowed: Vec<String> = node.handlers.keys().cloned().collect();
                    allowed.sort();
                    MatchOutcome::MethodNotAllowed { allowed }
                }
            },
            None => MatchOutcome::NotFound,
        }
    }

    /// Static-before-dynamic with backtracking (§3, §4.6): prefer the static
    /// child; on failure deeper in that subtree, fall back to the dynamic
    /// child.
    fn descend<'a>(
        &'a self,
        node: &'a Node,
        segments: &[String],
        i: usize,
        params: &mut HashMap<String, String>,
    ) -> Option<&'a Node> {
        if i == segments.len() {
            return Some(node);
        }

        let segment = &segments[i];
        let lookup_key = if self.case_sensitive { segment.clone() } else { segment.to_ascii_lowercase() };

        if let Some(child) = self.static_child(node, &lookup_key) {
            if let Some(found) = self.descend(child, segments, i + 1, params) {
                return Some(found);
            }
        }

        if let Some((name, child)) = &node.dynamic_child {
            let mut attempt = params.clone();
            attempt.insert(name.clone(), segment.clone());
            if let Some(found) = self.descend(child, segments, i + 1, &mut attempt) {
                *params = attempt;
                return Some(found);
            }
        }

        None
    }

    fn static_child<'a>(&self, node: &'a Node, lookup_key: &str) -> Option<&'a Node> {
        if self.case_sensitive {
            node.static_children.get(lookup_key)
        } else {
            node.static_children.iter().find(|(k, _)| k.to_ascii_lowercase() == lookup_key).map(|(_, v)| v)
        }
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect()
}

fn normalize_trailing_slash(path: &str) -> String {
    if path.len() > 1 { path.trim_end_matches('/').to_string() } else { path.to_string() }
}

fn toggle_trailing_slash(path: &str) -> String {
    if path.ends_with('/') && path.len() > 1 {
        path.trim_end_matches('/').to_string()
    } else {
        format!("{path}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(method: &str, template: &str, handler: &str) -> RouteEntry {
        RouteEntry { method: method.into(), path_template: template.into(), handler_name: handler.into() }
    }

    #[test]
    fn static_route_beats_dynamic_at_same_position() {
        let mut router = Router::new(true, TrailingSlashPolicy::Strict);
        router.register(route("GET", "/users/profile", "profile_handler")).unwrap();
        router.register(route("GET", "/users/{id}", "user_handler")).unwrap();

        match router.match_route("GET", "/users/profile") {
            MatchOutcome::Matched { handler_name, .. } => assert_eq!(handler_name, "profile_handler"),
            _ => panic!("expected match"),
        }

        match router.match_route("GET", "/users/42") {
            MatchOutcome::Matched { handler_name, path_params } => {
                assert_eq!(handler_name, "user_handler");
                assert_eq!(path_params.get("id"), Some(&"42".to_string()));
            }
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn no_route_is_404() {
        let router = Router::new(true, TrailingSlashPolicy::Strict);
        assert!(matches!(router.match_route("GET", "/nope"), MatchOutcome::NotFound));
    }

    #[test]
    fn wrong_method_is_405_with_allowed_list() {
        let mut router = Router::new(true, TrailingSlashPolicy::Strict);
        router.register(route("GET", "/items", "list_items")).unwrap();
        router.register(route("POST", "/items", "create_item")).unwrap();
        match router.match_route("DELETE", "/items") {
            MatchOutcome::MethodNotAllowed { allowed } => assert_eq!(allowed, vec!["GET", "POST"]),
            _ => panic!("expected 405"),
        }
    }

    #[test]
    fn duplicate_route_is_ambiguous() {
        let mut router = Router::new(true, TrailingSlashPolicy::Strict);
        router.register(route("GET", "/items", "a")).unwrap();
        assert!(router.register(route("GET", "/items", "b")).is_err());
    }

    #[test]
    fn conflicting_placeholder_names_are_ambiguous() {
        let mut router = Router::new(true, TrailingSlashPolicy::Strict);
        router.register(route("GET", "/users/{id}", "a")).unwrap();
        assert!(router.register(route("GET", "/users/{user_id}", "b")).is_err());
    }

    #[test]
    fn trailing_slash_ignore_normalizes() {
        let mut router = Router::new(true, TrailingSlashPolicy::Ignore);
        router.register(route("GET", "/items", "list_items")).unwrap();
        assert!(matches!(router.match_route("GET", "/items/"), MatchOutcome::Matched { .. }));
    }

    #[test]
    fn trailing_slash_redirect_reports_location() {
        let mut router = Router::new(true, TrailingSlashPolicy::Redirect);
        router.register(route("GET", "/items", "list_items")).unwrap();
        match router.match_route("GET", "/items/") {
            MatchOutcome::Redirect { location } => assert_eq!(location, "/items"),
            _ => panic!("expected redirect"),
        }
    }

    #[test]
    fn case_insensitive_static_match() {
        let mut router = Router::new(false, TrailingSlashPolicy::Strict);
        router.register(route("GET", "/Items", "list_items")).unwrap();
        assert!(matches!(router.match_route("GET", "/items"), MatchOutcome::Matched { .. }));
    }
}
