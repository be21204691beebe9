use super::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

thread_local! {
    static TRACE: RefCell<String> = RefCell::new(String::new());
    static FACTORY_READY: Cell<bool> = Cell::new(false);
}

fn trace(s: &str) {
    TRACE.with(|t| t.borrow_mut().push_str(s));
}

fn take_trace() -> String {
    TRACE.with(|t| std::mem::take(&mut *t.borrow_mut()))
}

fn same_address<A: ?Sized, B: ?Sized>(a: &Rc<A>, b: &Rc<B>) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

///////////////////////////////////////////////////////////////////////////////
// Test Types
///////////////////////////////////////////////////////////////////////////////

struct D;

impl D {
    fn run(&self) -> String {
        "D".into()
    }
}

impl Injectable for D {
    fn default_constructor() -> Option<DefaultConstructor<Self>> {
        Some(DefaultConstructor::new(|| D))
    }
}

impl Drop for D {
    fn drop(&mut self) {
        trace("D");
    }
}

struct C;

impl C {
    fn run(&self) -> String {
        "C".into()
    }
}

impl Injectable for C {
    fn default_constructor() -> Option<DefaultConstructor<Self>> {
        Some(DefaultConstructor::new(|| C))
    }
}

impl Drop for C {
    fn drop(&mut self) {
        trace("C");
    }
}

struct B {
    d: Rc<D>,
}

impl B {
    fn run(&self) -> String {
        format!("B{}", self.d.run())
    }
}

impl Injectable for B {
    fn dependencies() -> Option<Dependencies<Self>> {
        Some(Dependencies::new(|(d,): (Rc<D>,)| B { d }))
    }
}

impl Drop for B {
    fn drop(&mut self) {
        trace("B");
    }
}

struct A {
    b: Rc<B>,
    c: Rc<C>,
}

impl A {
    fn run(&self) -> String {
        format!("A{}{}", self.b.run(), self.c.run())
    }
}

impl Injectable for A {
    fn dependencies() -> Option<Dependencies<Self>> {
        Some(Dependencies::new(|(b, c): (Rc<B>, Rc<C>)| A { b, c }))
    }
}

impl Drop for A {
    fn drop(&mut self) {
        trace("A");
    }
}

/// Pulls its dependencies through the session instead of declaring them.
struct Puller {
    d: Rc<D>,
    c: Rc<C>,
}

impl Injectable for Puller {
    fn session_constructor() -> Option<SessionConstructor<Self>> {
        Some(SessionConstructor::new(|session| {
            let mut d: Option<Rc<D>> = None;
            let mut c: Option<Rc<C>> = None;
            session.inject((&mut d, &mut c))?;
            Ok(Puller {
                d: d.unwrap(),
                c: c.unwrap(),
            })
        }))
    }
}

///////////////////////////////////////////////////////////////////////////////
// Construction and Teardown
///////////////////////////////////////////////////////////////////////////////

#[test]
fn resolve_transitive_chain() {
    let session = Session::new();
    let b = session.resolve::<B>().unwrap();
    assert_eq!(b.run(), "BD");
    assert!(Rc::ptr_eq(&b.d, &session.resolve::<D>().unwrap()));
    assert_eq!(session.num_instances(), 2);
}

#[test]
fn run_and_destruction_order() {
    take_trace();
    {
        let a = create_session::<A>().unwrap();
        assert_eq!(a.run(), "ABDC");
        assert_eq!(
            a.session().construction_order(),
            vec![
                TypeKey::of::<D>(),
                TypeKey::of::<B>(),
                TypeKey::of::<C>(),
                TypeKey::of::<A>(),
            ]
        );
        assert_eq!(take_trace(), "");
    }
    assert_eq!(take_trace(), "ACBD");
}

#[test]
fn teardown_waits_for_outside_owners() {
    take_trace();
    let session = Session::new();
    let b = session.resolve::<B>().unwrap();
    drop(session);

    assert_eq!(take_trace(), "");
    drop(b);
    assert_eq!(take_trace(), "BD");
}

#[test]
fn inject_resolves_left_to_right() {
    take_trace();
    let session = Session::new();
    let puller = session.resolve::<Puller>().unwrap();

    assert!(Rc::ptr_eq(&puller.d, &session.resolve::<D>().unwrap()));
    assert!(Rc::ptr_eq(&puller.c, &session.resolve::<C>().unwrap()));
    assert_eq!(
        session.construction_order(),
        vec![
            TypeKey::of::<D>(),
            TypeKey::of::<C>(),
            TypeKey::of::<Puller>(),
        ]
    );
}

#[test]
fn inject_into_existing_handles() {
    let session = Session::new();
    let mut b: Option<Rc<B>> = None;
    let mut d = session.resolve::<D>().unwrap();
    session.inject((&mut b, &mut d)).unwrap();

    let b = b.unwrap();
    assert!(Rc::ptr_eq(&b.d, &d));
}

///////////////////////////////////////////////////////////////////////////////
// Scopes
///////////////////////////////////////////////////////////////////////////////

struct Request(u32);

impl Injectable for Request {
    fn default_constructor() -> Option<DefaultConstructor<Self>> {
        Some(DefaultConstructor::new(|| Request(0)))
    }

    fn scope() -> Option<Scope> {
        Some(Scope::PerRequest)
    }
}

trait Task {
    fn name(&self) -> &'static str;
}

impl Injectable for dyn Task {
    fn scope() -> Option<Scope> {
        Some(Scope::PerRequest)
    }
}

/// Inherits the scope of `dyn Task`.
struct Download;

impl Task for Download {
    fn name(&self) -> &'static str {
        "download"
    }
}

impl Injectable for Download {
    fn default_constructor() -> Option<DefaultConstructor<Self>> {
        Some(DefaultConstructor::new(|| Download))
    }

    fn interfaces(interfaces: &mut Interfaces<Self>) {
        interfaces.add::<dyn Task>(|this| this);
    }
}

/// Overrides the scope of `dyn Task`.
struct Upload;

impl Task for Upload {
    fn name(&self) -> &'static str {
        "upload"
    }
}

impl Injectable for Upload {
    fn default_constructor() -> Option<DefaultConstructor<Self>> {
        Some(DefaultConstructor::new(|| Upload))
    }

    fn scope() -> Option<Scope> {
        Some(Scope::Shared)
    }

    fn interfaces(interfaces: &mut Interfaces<Self>) {
        interfaces.add::<dyn Task>(|this| this);
    }
}

#[test]
fn shared_instances_are_identical() {
    let session = Session::new();
    let first = session.resolve::<D>().unwrap();
    let second = session.resolve::<D>().unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(session.num_instances(), 1);
}

#[test]
fn per_request_instances_are_distinct() {
    let session = Session::new();
    let first = session.resolve::<Request>().unwrap();
    let second = session.resolve::<Request>().unwrap();

    assert!(!Rc::ptr_eq(&first, &second));
    assert_eq!(first.0, second.0);
    assert_eq!(Rc::strong_count(&first), 1);
    assert_eq!(session.num_instances(), 0);
    assert!(!session.contains::<Request>());
}

#[test]
fn scope_is_inherited_from_interface() {
    let session = Session::new();
    let first = session.resolve::<Download>().unwrap();
    let second = session.resolve::<Download>().unwrap();
    assert!(!Rc::ptr_eq(&first, &second));
    assert_eq!(session.resolve::<dyn Task>().unwrap().name(), "download");
    assert_eq!(session.num_instances(), 0);
}

#[test]
fn declared_scope_overrides_interface() {
    let session = Session::new();
    let first = session.resolve::<Upload>().unwrap();
    let second = session.resolve::<Upload>().unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(first.name(), "upload");
    assert_eq!(session.num_instances(), 1);
}

///////////////////////////////////////////////////////////////////////////////
// Polymorphism
///////////////////////////////////////////////////////////////////////////////

trait Backend {
    fn run(&self) -> String;
}

/// Defaults to the real backend unless an implementation was registered.
impl Injectable for dyn Backend {
    fn default_constructor() -> Option<DefaultConstructor<Self>> {
        Some(DefaultConstructor::from_rc(|| {
            Rc::new(RealBackend) as Rc<dyn Backend>
        }))
    }
}

struct RealBackend;

impl Backend for RealBackend {
    fn run(&self) -> String {
        "B".into()
    }
}

struct MockBackend;

impl Backend for MockBackend {
    fn run(&self) -> String {
        "Bmock".into()
    }
}

impl Injectable for MockBackend {
    fn default_constructor() -> Option<DefaultConstructor<Self>> {
        Some(DefaultConstructor::new(|| MockBackend))
    }

    fn interfaces(interfaces: &mut Interfaces<Self>) {
        interfaces.add::<dyn Backend>(|this| this);
    }
}

struct Frontend {
    backend: Rc<dyn Backend>,
}

impl Injectable for Frontend {
    fn dependencies() -> Option<Dependencies<Self>> {
        Some(Dependencies::new(|(backend,): (Rc<dyn Backend>,)| {
            Frontend { backend }
        }))
    }
}

#[test]
fn interface_default_is_used_without_registration() {
    let session = Session::new();
    let frontend = session.resolve::<Frontend>().unwrap();
    assert_eq!(format!("A{}", frontend.backend.run()), "AB");
}

#[test]
fn registered_implementation_is_preferred() {
    let session = Session::new();
    session.register::<MockBackend>().unwrap();

    let frontend = session.resolve::<Frontend>().unwrap();
    assert_eq!(format!("A{}", frontend.backend.run()), "ABmock");
}

#[test]
fn interface_and_implementation_are_the_same_instance() {
    let session = Session::new();
    session.register::<MockBackend>().unwrap();

    let backend = session.resolve::<dyn Backend>().unwrap();
    let mock = session.resolve::<MockBackend>().unwrap();
    assert!(same_address(&backend, &mock));
    assert_eq!(session.num_instances(), 1);
}

#[test]
fn contains_and_release_look_at_the_exact_type() {
    let session = Session::new();
    session.register::<MockBackend>().unwrap();
    let backend = session.resolve::<dyn Backend>().unwrap();

    assert!(!session.contains::<dyn Backend>());
    assert!(session.release::<dyn Backend>().is_none());
    assert!(session.contains::<MockBackend>());

    let mock = session.release::<MockBackend>().unwrap();
    assert!(same_address(&backend, &mock));
}

trait Shape {
    fn sides(&self) -> u32;
}

trait Polygon: Shape {
    fn as_shape(self: Rc<Self>) -> Rc<dyn Shape>;
}

impl Injectable for dyn Shape {}

impl Injectable for dyn Polygon {
    fn interfaces(interfaces: &mut Interfaces<Self>) {
        interfaces.add::<dyn Shape>(|this| this.as_shape());
    }
}

struct Square;

impl Shape for Square {
    fn sides(&self) -> u32 {
        4
    }
}

impl Polygon for Square {
    fn as_shape(self: Rc<Self>) -> Rc<dyn Shape> {
        self
    }
}

impl Injectable for Square {
    fn default_constructor() -> Option<DefaultConstructor<Self>> {
        Some(DefaultConstructor::new(|| Square))
    }

    fn interfaces(interfaces: &mut Interfaces<Self>) {
        interfaces.add::<dyn Polygon>(|this| this);
    }
}

#[test]
fn hierarchy_resolves_to_one_instance() {
    let session = Session::new();
    session.register::<Square>().unwrap();

    let shape = session.resolve::<dyn Shape>().unwrap();
    let polygon = session.resolve::<dyn Polygon>().unwrap();
    let square = session.resolve::<Square>().unwrap();

    assert_eq!(shape.sides(), 4);
    assert!(same_address(&shape, &polygon));
    assert!(same_address(&polygon, &square));
}

trait Named {
    fn name(&self) -> String;
}

impl Injectable for dyn Named {}

struct NamedA;

impl Named for NamedA {
    fn name(&self) -> String {
        "A".into()
    }
}

impl Injectable for NamedA {
    fn default_constructor() -> Option<DefaultConstructor<Self>> {
        Some(DefaultConstructor::new(|| NamedA))
    }
}

struct NamedZ;

impl Named for NamedZ {
    fn name(&self) -> String {
        "Z".into()
    }
}

impl Injectable for NamedZ {
    fn default_constructor() -> Option<DefaultConstructor<Self>> {
        Some(DefaultConstructor::new(|| NamedZ))
    }
}

#[test]
fn interface_without_constructor_fails() {
    let session = Session::new();
    let result = session.resolve::<dyn Named>();
    assert_eq!(
        result.err(),
        Some(Error::UnknownConstruction {
            type_name: TypeKey::of::<dyn Named>().name()
        })
    );
}

#[test]
fn interface_resolves_through_implementation() {
    let session = Session::new();
    assert!(session.resolve::<dyn Named>().is_err());

    session
        .register_implementation::<NamedA, _>(|interfaces| {
            interfaces.add::<dyn Named>(|this| this);
        })
        .unwrap();
    assert_eq!(session.resolve::<dyn Named>().unwrap().name(), "A");
}

#[test]
fn last_registered_implementation_wins() {
    let session = Session::new();
    session
        .register_implementation::<NamedZ, _>(|interfaces| {
            interfaces.add::<dyn Named>(|this| this);
        })
        .unwrap();
    session
        .register_implementation::<NamedA, _>(|interfaces| {
            interfaces.add::<dyn Named>(|this| this);
        })
        .unwrap();

    assert_eq!(session.resolve::<dyn Named>().unwrap().name(), "A");
}

#[test]
fn inserted_instance_wins_over_implementation() {
    let session = Session::new();
    let inserted: Rc<dyn Named> = Rc::new(NamedZ);
    session.insert(inserted.clone()).unwrap();
    session
        .register_implementation::<NamedA, _>(|interfaces| {
            interfaces.add::<dyn Named>(|this| this);
        })
        .unwrap();

    let resolved = session.resolve::<dyn Named>().unwrap();
    assert_eq!(resolved.name(), "Z");
    assert!(same_address(&resolved, &inserted));
    assert!(!session.contains::<NamedA>());
}

///////////////////////////////////////////////////////////////////////////////
// Session Dependency
///////////////////////////////////////////////////////////////////////////////

struct Holder {
    session: SessionHandle,
}

impl Injectable for Holder {
    fn dependencies() -> Option<Dependencies<Self>> {
        Some(Dependencies::new(|(session,): (SessionHandle,)| Holder {
            session,
        }))
    }
}

impl Drop for Holder {
    fn drop(&mut self) {
        trace("H");
    }
}

#[test]
fn session_dependency_is_not_constructed() {
    let session = Session::new();
    let holder = session.resolve::<Holder>().unwrap();

    assert!(holder.session.ptr_eq(&session.handle()));
    assert_eq!(session.construction_order(), vec![TypeKey::of::<Holder>()]);
    assert!(Rc::ptr_eq(&holder, &holder.session.resolve::<Holder>().unwrap()));
}

#[test]
fn session_handle_is_weak() {
    take_trace();
    let rooted = create_session::<Holder>().unwrap();
    let handle = rooted.session().handle();

    drop(rooted);
    assert_eq!(take_trace(), "H");
    assert!(handle.upgrade().is_none());
}

#[test]
fn dependent_outliving_its_session_cannot_resolve() {
    take_trace();
    let (holder, session) = create_session::<Holder>().unwrap().into_parts();
    drop(session);

    assert_eq!(take_trace(), "");
    assert_eq!(holder.session.resolve::<C>().err(), Some(Error::SessionDropped));
    drop(holder);
    assert_eq!(take_trace(), "H");
}

///////////////////////////////////////////////////////////////////////////////
// Errors
///////////////////////////////////////////////////////////////////////////////

struct Chicken {
    _egg: Rc<Egg>,
}

impl Injectable for Chicken {
    fn dependencies() -> Option<Dependencies<Self>> {
        Some(Dependencies::new(|(egg,): (Rc<Egg>,)| Chicken { _egg: egg }))
    }
}

struct Egg {
    _chicken: Rc<Chicken>,
}

impl Injectable for Egg {
    fn dependencies() -> Option<Dependencies<Self>> {
        Some(Dependencies::new(|(chicken,): (Rc<Chicken>,)| Egg {
            _chicken: chicken,
        }))
    }
}

/// Asks for itself from inside its own constructor.
struct Narcissus;

impl Injectable for Narcissus {
    fn session_constructor() -> Option<SessionConstructor<Self>> {
        Some(SessionConstructor::new(|session| {
            session.resolve::<Narcissus>()?;
            Ok(Narcissus)
        }))
    }
}

#[test]
fn cycle_is_detected() {
    let session = Session::new();
    let result = session.resolve::<Chicken>();
    assert_eq!(
        result.err(),
        Some(Error::CyclicDependency {
            type_name: TypeKey::of::<Chicken>().name()
        })
    );
    assert_eq!(session.num_instances(), 0);
}

#[test]
fn cycle_is_detected_again() {
    let session = Session::new();
    assert!(session.resolve::<Chicken>().is_err());
    assert!(matches!(
        session.resolve::<Egg>(),
        Err(Error::CyclicDependency { .. })
    ));
    assert!(matches!(
        session.resolve::<Chicken>(),
        Err(Error::CyclicDependency { .. })
    ));
}

#[test]
fn cycle_through_session_is_detected() {
    let session = Session::new();
    assert!(matches!(
        session.resolve::<Narcissus>(),
        Err(Error::CyclicDependency { .. })
    ));
}

struct Flaky;

impl Injectable for Flaky {}

#[test]
fn failed_resolve_can_be_retried() {
    FACTORY_READY.with(|ready| ready.set(false));
    let session = Session::new();
    session
        .register_factory::<Flaky, _>(|_| {
            if FACTORY_READY.with(|ready| ready.get()) {
                Some(Rc::new(Flaky))
            } else {
                None
            }
        })
        .unwrap();

    assert_eq!(
        session.resolve::<Flaky>().err(),
        Some(Error::NullInstance {
            type_name: TypeKey::of::<Flaky>().name()
        })
    );
    assert!(!session.contains::<Flaky>());

    FACTORY_READY.with(|ready| ready.set(true));
    assert!(session.resolve::<Flaky>().is_ok());
    assert!(session.contains::<Flaky>());
}

#[test]
fn factory_resolves_dependencies() {
    let session = Session::new();
    session
        .register_factory::<dyn Named, _>(|resolver| {
            let d = resolver.resolve::<D>().ok()?;
            Some(Rc::new(NamedA) as Rc<dyn Named>).filter(|_| d.run() == "D")
        })
        .unwrap();

    assert_eq!(session.resolve::<dyn Named>().unwrap().name(), "A");
    assert!(session.contains::<D>());
}

#[test]
fn duplicate_registration_fails() {
    let session = Session::new();
    session.register::<D>().unwrap();
    assert_eq!(
        session.register::<D>(),
        Err(Error::DuplicateRegistration {
            type_name: TypeKey::of::<D>().name()
        })
    );
}

#[test]
fn registration_after_resolve_fails() {
    let session = Session::new();
    session.resolve::<D>().unwrap();
    assert!(matches!(
        session.register::<D>(),
        Err(Error::DuplicateRegistration { .. })
    ));
}

#[test]
fn duplicate_instance_fails() {
    let session = Session::new();
    let d = session.resolve::<D>().unwrap();
    assert_eq!(
        session.insert(Rc::new(D)),
        Err(Error::DuplicateInstance {
            type_name: TypeKey::of::<D>().name()
        })
    );
    assert!(Rc::ptr_eq(&d, &session.resolve::<D>().unwrap()));
}

#[test]
fn released_instance_fails() {
    let session = Session::new();
    let b = session.resolve::<B>().unwrap();
    let released = session.release::<B>().unwrap();
    drop((b, released));

    assert_eq!(
        session.resolve::<B>().err(),
        Some(Error::ReleasedInstance {
            type_name: TypeKey::of::<B>().name()
        })
    );
    // Dependencies are unaffected.
    assert!(session.resolve::<D>().is_ok());
}
