//! Endpoint registry: canonical paths, collision detection, method sets.
//!
//! Paths are derived from member names and compared lowercased. Two members
//! that normalize to the same path are a configuration error raised while the
//! registry is built, never at request time.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::binder::{BoundEndpoint, EndpointBinder};
use crate::error::RegistryError;
use crate::members::{Discovered, DiscoveredMember};

/// Names never exposed, even when declared.
pub const EXCLUDED_MEMBERS: &[&str] = &["run", "app", "set_verbose"];

/// HTTP verbs an endpoint may accept.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

impl core::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{GET, POST}`.
pub fn default_methods() -> BTreeSet<HttpMethod> {
    BTreeSet::from([HttpMethod::Get, HttpMethod::Post])
}

/// How a member is invoked.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Method,
    StaticMethod,
    ClassMethod,
    PropertyGetter,
}

/// `/name`, or `/property/name` for properties; always lowercase.
pub fn canonical_path(name: &str, kind: MemberKind) -> String {
    match kind {
        MemberKind::PropertyGetter => format!("/property/{}", name.to_lowercase()),
        _ => format!("/{}", name.to_lowercase()),
    }
}

/// Public, not excluded, and usable as a path segment.
///
/// Exclusions ignore case since paths are lowercased.
pub fn is_exposable(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('_')
        && !EXCLUDED_MEMBERS.iter().any(|x| x.eq_ignore_ascii_case(name))
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One routable operation.
#[derive(Debug, Clone)]
pub struct EndpointEntry {
    pub path: String,
    pub member_name: String,
    pub unit: Option<String>,
    pub http_methods: BTreeSet<HttpMethod>,
    pub kind: MemberKind,
    pub doc: Option<String>,
    pub endpoint: BoundEndpoint,
}

/// All endpoints of one server, keyed by canonical path.
pub struct EndpointRegistry {
    binder: EndpointBinder,
    entries: BTreeMap<String, EndpointEntry>,
    method_overrides: HashMap<String, BTreeSet<HttpMethod>>,
}

impl EndpointRegistry {
    pub fn new(binder: EndpointBinder) -> Self {
        Self {
            binder,
            entries: BTreeMap::new(),
            method_overrides: HashMap::new(),
        }
    }

    /// Per-member method restrictions, keyed by member name.
    ///
    /// Must be supplied before members are registered.
    pub fn with_method_overrides(mut self, overrides: HashMap<String, BTreeSet<HttpMethod>>) -> Self {
        self.method_overrides = overrides;
        self
    }

    pub fn binder(&self) -> &EndpointBinder {
        &self.binder
    }

    /// Wrap and register every exposable member of a service.
    pub fn register(&mut self, discovered: Discovered) -> Result<usize, RegistryError> {
        let staged = self.stage(&discovered.members, None, |m| canonical_path(&m.name, m.kind), |m| {
            m.name.clone()
        })?;
        Ok(self.commit(staged))
    }

    /// Graft a unit's members under `/{unit}/...`.
    ///
    /// Members are first staged under flat names (`{unit}_{member}`, or
    /// `{unit}_property_{name}` for properties) and then rewritten into the
    /// nested shape. The whole mount fails, leaving the registry unchanged, if
    /// any rewritten path collides.
    pub fn mount_unit(&mut self, unit: &str, discovered: Discovered) -> Result<usize, RegistryError> {
        let flat_name = |m: &DiscoveredMember| match m.kind {
            MemberKind::PropertyGetter => format!("{unit}_property_{}", m.name),
            _ => format!("{unit}_{}", m.name),
        };
        let nested_path = |m: &DiscoveredMember| rewrite_unit_path(unit, &format!("/{}", flat_name(m).to_lowercase()));
        let staged = self.stage(&discovered.members, Some(unit), nested_path, flat_name)?;
        let count = self.commit(staged);
        tracing::debug!(unit, count, "mounted unit {}", discovered.class);
        Ok(count)
    }

    /// Insert one already-built entry.
    pub fn insert(&mut self, mut entry: EndpointEntry) -> Result<(), RegistryError> {
        entry.path = entry.path.to_lowercase();
        self.check_free(&entry.path, &entry.member_name, &BTreeMap::new())?;
        self.entries.insert(entry.path.clone(), entry);
        Ok(())
    }

    fn stage(
        &self,
        members: &[DiscoveredMember],
        unit: Option<&str>,
        path_of: impl Fn(&DiscoveredMember) -> String,
        name_of: impl Fn(&DiscoveredMember) -> String,
    ) -> Result<BTreeMap<String, EndpointEntry>, RegistryError> {
        let mut staged = BTreeMap::new();
        for member in members {
            if !is_exposable(&member.name) {
                tracing::debug!(member = %member.name, "skipping non-public member");
                continue;
            }
            let path = path_of(member);
            let member_name = name_of(member);
            self.check_free(&path, &member_name, &staged)?;

            let http_methods = self
                .method_overrides
                .get(&member_name)
                .cloned()
                .or_else(|| member.methods.clone())
                .unwrap_or_else(default_methods);
            let endpoint = self.binder.wrap(
                member.name.clone(),
                member.kind,
                member.params.clone(),
                member.handler.clone(),
            );
            staged.insert(
                path.clone(),
                EndpointEntry {
                    path,
                    member_name,
                    unit: unit.map(str::to_string),
                    http_methods,
                    kind: member.kind,
                    doc: member.doc.clone(),
                    endpoint,
                },
            );
        }
        Ok(staged)
    }

    fn check_free(
        &self,
        path: &str,
        member: &str,
        staged: &BTreeMap<String, EndpointEntry>,
    ) -> Result<(), RegistryError> {
        let lowered = path.to_lowercase();
        let existing = self.entries.get(&lowered).or_else(|| staged.get(&lowered));
        match existing {
            Some(existing) => Err(RegistryError::PathConflict {
                path: lowered,
                member: member.to_string(),
                existing: existing.member_name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn commit(&mut self, staged: BTreeMap<String, EndpointEntry>) -> usize {
        let count = staged.len();
        self.entries.extend(staged);
        count
    }

    pub fn get(&self, path: &str) -> Option<&EndpointEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &EndpointEntry> {
        self.entries.values()
    }

    /// Member names that carry a method override but matched nothing.
    pub fn unused_overrides(&self) -> Vec<&str> {
        self.method_overrides
            .keys()
            .filter(|name| !self.entries.values().any(|e| &e.member_name == *name))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<EndpointEntry> {
        self.entries.into_values().collect()
    }
}

/// `/{unit}_property_x` → `/{unit}/property/x`, `/{unit}_x` → `/{unit}/x`.
pub fn rewrite_unit_path(unit: &str, path: &str) -> String {
    let unit = unit.to_lowercase();
    let property_prefix = format!("/{unit}_property_");
    let member_prefix = format!("/{unit}_");
    if let Some(rest) = path.strip_prefix(&property_prefix) {
        format!("/{unit}/property/{rest}")
    } else if let Some(rest) = path.strip_prefix(&member_prefix) {
        format!("/{unit}/{rest}")
    } else {
        path.to_string()
    }
}
