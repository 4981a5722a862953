//! Explicit member discovery.
//!
//! A service lists the operations it exposes by implementing [`Service`]. The
//! listing plays the role of scanning a class: ordinary methods, static
//! methods, class methods, and read-only properties, each with an optional
//! docstring, parameter schema, and HTTP method restriction.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::binder::{Handler, HandlerFn};
use crate::error::EndpointError;
use crate::params::{Args, ParamSchema};
use crate::registry::{HttpMethod, MemberKind};
use crate::response::Reply;

/// An object whose public members can be served over HTTP.
pub trait Service: Send + Sync + 'static {
    /// Declare every member this service exposes.
    fn describe(members: &mut Members<Self>)
    where
        Self: Sized;
}

/// Information handed to class methods in place of a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassInfo {
    pub name: &'static str,
}

type MethodFn<S> = Arc<dyn Fn(&S, &Args) -> Result<Reply, EndpointError> + Send + Sync>;
type StaticFn = Arc<dyn Fn(&Args) -> Result<Reply, EndpointError> + Send + Sync>;
type ClassFn = Arc<dyn Fn(ClassInfo, &Args) -> Result<Reply, EndpointError> + Send + Sync>;
type PropertyFn<S> = Arc<dyn Fn(&S) -> Result<Reply, EndpointError> + Send + Sync>;

enum Invoke<S> {
    Method(MethodFn<S>),
    Static(StaticFn),
    Class(ClassFn),
    Property(PropertyFn<S>),
}

impl<S> Clone for Invoke<S> {
    fn clone(&self) -> Self {
        match self {
            Invoke::Method(f) => Invoke::Method(Arc::clone(f)),
            Invoke::Static(f) => Invoke::Static(Arc::clone(f)),
            Invoke::Class(f) => Invoke::Class(Arc::clone(f)),
            Invoke::Property(f) => Invoke::Property(Arc::clone(f)),
        }
    }
}

/// One declared member of a service.
pub struct Member<S> {
    name: String,
    doc: Option<String>,
    params: ParamSchema,
    methods: Option<BTreeSet<HttpMethod>>,
    invoke: Invoke<S>,
}

impl<S> Member<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MemberKind {
        match self.invoke {
            Invoke::Method(_) => MemberKind::Method,
            Invoke::Static(_) => MemberKind::StaticMethod,
            Invoke::Class(_) => MemberKind::ClassMethod,
            Invoke::Property(_) => MemberKind::PropertyGetter,
        }
    }
}

/// Member declarations of one service type, in declaration order.
pub struct Members<S> {
    class: &'static str,
    members: Vec<Member<S>>,
}

impl<S: Service> Members<S> {
    /// Collect the members `S` declares.
    pub fn of() -> Self {
        let mut members = Members {
            class: short_type_name::<S>(),
            members: Vec::new(),
        };
        S::describe(&mut members);
        members
    }

    /// Include the members of a parent service reachable through `project`.
    ///
    /// Members declared later with the same name override inherited ones.
    pub fn inherit<P, F>(&mut self, project: F) -> &mut Self
    where
        P: Service,
        F: Fn(&S) -> &P + Send + Sync + 'static,
    {
        let project = Arc::new(project);
        for parent in Members::<P>::of().members {
            let invoke = match parent.invoke {
                Invoke::Method(f) => {
                    let project = Arc::clone(&project);
                    Invoke::Method(Arc::new(move |s: &S, args: &Args| f(project(s), args)))
                }
                Invoke::Property(f) => {
                    let project = Arc::clone(&project);
                    Invoke::Property(Arc::new(move |s: &S| f(project(s))))
                }
                Invoke::Static(f) => Invoke::Static(f),
                Invoke::Class(f) => Invoke::Class(f),
            };
            self.push(Member {
                name: parent.name,
                doc: parent.doc,
                params: parent.params,
                methods: parent.methods,
                invoke,
            });
        }
        self
    }
}

impl<S: Send + Sync + 'static> Members<S> {
    pub fn class_name(&self) -> &'static str {
        self.class
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member<S>> {
        self.members.iter()
    }

    /// An instance method; receives `&self` and the bound arguments.
    pub fn method<F>(&mut self, name: impl Into<String>, f: F) -> MemberMut<'_, S>
    where
        F: Fn(&S, &Args) -> Result<Reply, EndpointError> + Send + Sync + 'static,
    {
        self.push(Member::new(name.into(), Invoke::Method(Arc::new(f)), ParamSchema::new()))
    }

    /// A static method; no receiver.
    pub fn static_method<F>(&mut self, name: impl Into<String>, f: F) -> MemberMut<'_, S>
    where
        F: Fn(&Args) -> Result<Reply, EndpointError> + Send + Sync + 'static,
    {
        self.push(Member::new(name.into(), Invoke::Static(Arc::new(f)), ParamSchema::new()))
    }

    /// A class method; receives the owning type's [`ClassInfo`].
    pub fn class_method<F>(&mut self, name: impl Into<String>, f: F) -> MemberMut<'_, S>
    where
        F: Fn(ClassInfo, &Args) -> Result<Reply, EndpointError> + Send + Sync + 'static,
    {
        self.push(Member::new(name.into(), Invoke::Class(Arc::new(f)), ParamSchema::new()))
    }

    /// A read-only property, served under `/property/{name}`.
    ///
    /// Request parameters are accepted and ignored.
    pub fn property<F>(&mut self, name: impl Into<String>, f: F) -> MemberMut<'_, S>
    where
        F: Fn(&S) -> Result<Reply, EndpointError> + Send + Sync + 'static,
    {
        self.push(Member::new(
            name.into(),
            Invoke::Property(Arc::new(f)),
            ParamSchema::new().accept_extra(),
        ))
    }

    fn push(&mut self, member: Member<S>) -> MemberMut<'_, S> {
        let idx = match self.members.iter().position(|m| m.name == member.name) {
            Some(idx) => {
                self.members[idx] = member;
                idx
            }
            None => {
                self.members.push(member);
                self.members.len() - 1
            }
        };
        MemberMut {
            member: &mut self.members[idx],
        }
    }

    /// Attach the members to a live instance, erasing the service type.
    pub fn bind(self, instance: Arc<S>) -> Discovered {
        let class = ClassInfo { name: self.class };
        let members = self
            .members
            .into_iter()
            .map(|m| {
                let kind = m.kind();
                let handler: HandlerFn = match m.invoke {
                    Invoke::Method(f) => {
                        let instance = Arc::clone(&instance);
                        Arc::new(move |args: &Args| f(&instance, args))
                    }
                    Invoke::Property(f) => {
                        let instance = Arc::clone(&instance);
                        Arc::new(move |_: &Args| f(&instance))
                    }
                    Invoke::Static(f) => f,
                    Invoke::Class(f) => Arc::new(move |args: &Args| f(class, args)),
                };
                DiscoveredMember {
                    name: m.name,
                    kind,
                    doc: m.doc,
                    params: m.params,
                    methods: m.methods,
                    handler: Handler::Raw(handler),
                }
            })
            .collect();
        Discovered {
            class: self.class.to_string(),
            members,
        }
    }
}

impl<S> Member<S> {
    fn new(name: String, invoke: Invoke<S>, params: ParamSchema) -> Self {
        Self {
            name,
            doc: None,
            params,
            methods: None,
            invoke,
        }
    }
}

/// Fluent configuration of the member just declared.
pub struct MemberMut<'a, S> {
    member: &'a mut Member<S>,
}

impl<S> MemberMut<'_, S> {
    pub fn doc(self, doc: impl Into<String>) -> Self {
        self.member.doc = Some(doc.into());
        self
    }

    pub fn params(self, params: ParamSchema) -> Self {
        self.member.params = params;
        self
    }

    /// Restrict the member to the given HTTP methods.
    pub fn methods(self, methods: impl IntoIterator<Item = HttpMethod>) -> Self {
        self.member.methods = Some(methods.into_iter().collect());
        self
    }
}

/// A service's members bound to an instance, ready for registration.
#[derive(Clone)]
pub struct Discovered {
    pub class: String,
    pub members: Vec<DiscoveredMember>,
}

impl Discovered {
    /// Discover and bind `S`'s members in one step.
    pub fn from_service<S: Service>(instance: Arc<S>) -> Self {
        Members::<S>::of().bind(instance)
    }

    /// Layer `child` on top: same-named members are replaced, new ones appended.
    pub fn overlay(mut self, child: Discovered) -> Self {
        for member in child.members {
            match self.members.iter().position(|m| m.name == member.name) {
                Some(idx) => self.members[idx] = member,
                None => self.members.push(member),
            }
        }
        self.class = child.class;
        self
    }
}

/// A type-erased member.
#[derive(Clone)]
pub struct DiscoveredMember {
    pub name: String,
    pub kind: MemberKind,
    pub doc: Option<String>,
    pub params: ParamSchema,
    pub methods: Option<BTreeSet<HttpMethod>>,
    pub handler: Handler,
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Parent;

    impl Service for Parent {
        fn describe(m: &mut Members<Self>) {
            m.method("greet", |_, _| Reply::json("parent"));
            m.method("only_parent", |_, _| Reply::json("kept"));
        }
    }

    struct Child {
        parent: Parent,
    }

    impl Service for Child {
        fn describe(m: &mut Members<Self>) {
            m.inherit(|c: &Child| &c.parent);
            m.method("greet", |_, _| Reply::json("child")).doc("Overridden.");
            m.static_method("util", |_| Reply::json("static"));
            m.class_method("who", |cls, _| Reply::json(cls.name));
            m.property("prop", |_| Reply::json(json!({"p": 1})));
        }
    }

    fn call(d: &Discovered, name: &str) -> Reply {
        let member = d.members.iter().find(|m| m.name == name).unwrap();
        match &member.handler {
            Handler::Raw(f) => f(&Args::default()).unwrap(),
            Handler::Bound(_) => panic!("freshly discovered members are unbound"),
        }
    }

    #[test]
    fn child_overrides_inherited_member_in_place() {
        let d = Discovered::from_service(Arc::new(Child { parent: Parent }));
        let names: Vec<_> = d.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["greet", "only_parent", "util", "who", "prop"]);
        assert_eq!(call(&d, "greet"), Reply::from(json!("child")));
        assert_eq!(call(&d, "only_parent"), Reply::from(json!("kept")));
    }

    #[test]
    fn kinds_and_class_info_are_recorded() {
        let d = Discovered::from_service(Arc::new(Child { parent: Parent }));
        let kind = |n: &str| d.members.iter().find(|m| m.name == n).unwrap().kind;
        assert_eq!(kind("greet"), MemberKind::Method);
        assert_eq!(kind("util"), MemberKind::StaticMethod);
        assert_eq!(kind("who"), MemberKind::ClassMethod);
        assert_eq!(kind("prop"), MemberKind::PropertyGetter);
        assert_eq!(call(&d, "who"), Reply::from(json!("Child")));
        assert_eq!(d.class, "Child");
    }

    #[test]
    fn overlay_replaces_by_exact_name() {
        let base = Discovered::from_service(Arc::new(Parent));
        let child = Discovered::from_service(Arc::new(Child { parent: Parent }));
        let merged = base.overlay(child);
        assert_eq!(merged.members.len(), 5);
        assert_eq!(merged.members[0].doc.as_deref(), Some("Overridden."));
    }
}
