//! crates/personnel_core/src/guard.rs
//!
//! The route guard: decides on every navigation whether the requested view may
//! render for the current session, and where to go instead when it may not.
//! Decisions are never cached; role and session can change between navigations.

use std::collections::BTreeMap;

use crate::domain::{Role, Session};
use crate::session::landing_route;

pub const LOGIN_PATH: &str = "/login";

//=========================================================================================
// Capabilities
//=========================================================================================

/// Actions a view may offer. Views ask `can` instead of comparing roles themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ManageEmployees,
    ManageLeave,
    ManageBmi,
    ManageMedical,
    ManageEquipment,
    ManageCourses,
    ManageUsers,
    ViewAttendance,
    ManageAttendance,
    ViewOwnProfile,
    RequestLeave,
    MarkAttendance,
}

pub fn can(role: Role, capability: Capability) -> bool {
    match role {
        Role::Admin => true,
        Role::Employee => matches!(
            capability,
            Capability::ViewOwnProfile | Capability::RequestLeave | Capability::MarkAttendance
        ),
    }
}

/// `can` for whoever is signed in; an unresolved or anonymous session can do nothing.
pub fn session_can(session: &Session, capability: Capability) -> bool {
    session.is_resolved()
        && session
            .identity
            .as_ref()
            .is_some_and(|user| can(user.role, capability))
}

//=========================================================================================
// Route Table
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Signed-in users whose role is listed; an empty list admits any role.
    Roles(&'static [Role]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Rest,
}

#[derive(Debug, Clone)]
struct RouteRule {
    pattern: &'static str,
    segments: Vec<Segment>,
    access: Access,
}

impl RouteRule {
    fn new(pattern: &'static str, access: Access) -> Self {
        let segments = split(pattern)
            .map(|seg| match seg {
                "*" => Segment::Rest,
                _ if seg.starts_with(':') => Segment::Param(seg[1..].to_string()),
                _ => Segment::Literal(seg.to_string()),
            })
            .collect();
        Self {
            pattern,
            segments,
            access,
        }
    }

    fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let parts: Vec<&str> = split(path).collect();
        let mut params = BTreeMap::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest => {
                    params.insert("*".to_string(), parts.get(i..).unwrap_or(&[]).join("/"));
                    return Some(params);
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), parts.get(i)?.to_string());
                }
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
            }
        }
        (parts.len() == self.segments.len()).then_some(params)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|seg| !seg.is_empty())
}

/// Strips the hash prefix and query string a browser location carries.
fn clean(path: &str) -> &str {
    let path = path.trim().trim_start_matches('#');
    path.split('?').next().unwrap_or(path)
}

//=========================================================================================
// Decisions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Unauthenticated,
    AuthenticatedUnauthorized,
    AuthenticatedAuthorized,
}

/// The matched route handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub pattern: &'static str,
    pub path: String,
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Session not resolved yet: show a placeholder, decide nothing.
    Loading,
    Redirect(String),
    Render(RouteMatch),
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    rules: Vec<RouteRule>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new()
            .route(LOGIN_PATH, Access::Public)
            .route("/admin/*", Access::Roles(&[Role::Admin]))
            .route("/employee/*", Access::Roles(&[Role::Employee]))
    }
}

impl RouteGuard {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Adds a rule; earlier rules win.
    pub fn route(mut self, pattern: &'static str, access: Access) -> Self {
        self.rules.push(RouteRule::new(pattern, access));
        self
    }

    /// The guard state for a view requiring `required` roles (empty = any signed-in role).
    pub fn state(session: &Session, required: &[Role]) -> GuardState {
        if !session.is_resolved() {
            return GuardState::Loading;
        }
        match &session.identity {
            None => GuardState::Unauthenticated,
            Some(user) if !required.is_empty() && !required.contains(&user.role) => {
                GuardState::AuthenticatedUnauthorized
            }
            Some(_) => GuardState::AuthenticatedAuthorized,
        }
    }

    pub fn navigate(&self, session: &Session, path: &str) -> Navigation {
        let path = clean(path);
        let Some((rule, params)) = self
            .rules
            .iter()
            .find_map(|rule| rule.matches(path).map(|params| (rule, params)))
        else {
            return Navigation::Redirect(LOGIN_PATH.to_string());
        };

        let route = RouteMatch {
            pattern: rule.pattern,
            path: path.to_string(),
            params,
        };
        let required = match rule.access {
            Access::Public => return Navigation::Render(route),
            Access::Roles(roles) => roles,
        };

        match Self::state(session, required) {
            GuardState::Loading => Navigation::Loading,
            GuardState::Unauthenticated => Navigation::Redirect(LOGIN_PATH.to_string()),
            GuardState::AuthenticatedUnauthorized => match &session.identity {
                Some(user) => Navigation::Redirect(landing_route(user)),
                None => Navigation::Redirect(LOGIN_PATH.to_string()),
            },
            GuardState::AuthenticatedAuthorized => Navigation::Render(route),
        }
    }
}
