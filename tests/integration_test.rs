use engine_interop::app::{Application, ApplicationHost};
use engine_interop::bindings::{
    Handle, NativeApi, Proxy, ProxyKind, RefCounted, RefCountedExt, Runtime, RuntimeState,
    Strength, REF_COUNTED,
};
use engine_interop::config::InteropConfig;
use engine_interop::native::NativeHeap;
use engine_interop::BindingError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static RESOURCE: ProxyKind = ProxyKind::derived("Resource", &REF_COUNTED);
static TEXTURE: ProxyKind = ProxyKind::derived("Texture", &RESOURCE);
static MESH: ProxyKind = ProxyKind::derived("Mesh", &RESOURCE);

struct Texture {
    proxy: Proxy,
    deleted: Arc<AtomicUsize>,
}

impl RefCounted for Texture {
    fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    fn on_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::SeqCst);
    }
}

fn runtime() -> (Arc<NativeHeap>, Runtime) {
    let heap = Arc::new(NativeHeap::new());
    let native: Arc<dyn NativeApi> = heap.clone();
    let runtime = Runtime::new(native);
    runtime.setup();
    runtime.initialize();
    (heap, runtime)
}

fn texture(runtime: &Runtime, handle: Handle, deleted: &Arc<AtomicUsize>) -> Arc<Texture> {
    let deleted = Arc::clone(deleted);
    runtime
        .wrap(handle, &TEXTURE, move |proxy| Texture { proxy, deleted })
        .unwrap()
}

#[test]
fn test_weak_and_strong_entries_tear_down_once() {
    let (heap, runtime) = runtime();
    let deleted = Arc::new(AtomicUsize::new(0));

    // 原生引用计数为0 -> 弱引用
    let h = heap.create();
    let a = texture(&runtime, h, &deleted);
    assert_eq!(runtime.registry().strength(h), Some(Strength::Weak));

    // 原生引用计数为1 -> 强引用
    let h2 = heap.create();
    heap.add_ref(h2).unwrap();
    let b = texture(&runtime, h2, &deleted);
    assert_eq!(runtime.registry().strength(h2), Some(Strength::Strong));

    a.dispose();
    assert!(!runtime.registry().contains(h));
    assert!(a.is_deleted());
    assert_eq!(deleted.load(Ordering::SeqCst), 1);

    let requests = heap.try_delete_requests();
    heap.release(h2).unwrap();
    assert!(b.is_deleted());
    assert_eq!(deleted.load(Ordering::SeqCst), 2);
    assert!(!runtime.registry().contains(h2));

    drop(b);
    drop(a);
    assert_eq!(heap.try_delete_requests(), requests);
}

#[test]
fn test_lookup_returns_registered_proxy() {
    let (heap, runtime) = runtime();
    let deleted = Arc::new(AtomicUsize::new(0));
    let handle = heap.create();
    let object = texture(&runtime, handle, &deleted);

    let found = runtime.lookup_as::<Texture>(handle).unwrap();
    assert!(Arc::ptr_eq(&found, &object));
    assert!(runtime.lookup_as::<engine_interop::NativeObject>(handle).is_none());
}

#[test]
fn test_dispose_then_drop_fires_hook_once() {
    let (heap, runtime) = runtime();
    let deleted = Arc::new(AtomicUsize::new(0));
    let handle = heap.create();
    heap.add_ref(handle).unwrap();

    let object = texture(&runtime, handle, &deleted);
    object.dispose();
    object.dispose();
    drop(object);

    assert_eq!(deleted.load(Ordering::SeqCst), 1);
    // 仍有原生引用，try_delete 被拒绝
    assert!(heap.is_alive(handle));
    assert_eq!(heap.try_delete_requests(), 1);
}

#[test]
fn test_identity_rules() {
    let (heap, runtime) = runtime();
    let handle = heap.create();

    let texture = runtime.bind(handle, &TEXTURE).unwrap();
    let err = runtime.bind(handle, &MESH).unwrap_err();
    assert_eq!(
        err,
        BindingError::IdentityConflict {
            handle,
            existing: "Texture",
            requested: "Mesh",
        }
    );

    // 父类型可以替换子类型
    let resource = runtime.bind(handle, &RESOURCE).unwrap();
    let current = runtime.lookup(handle).unwrap();
    assert!(current.same_object(&*resource));
    assert!(!current.same_object(&*texture));

    // 被替换的绑定释放时不会删除新绑定的原生对象
    drop(current);
    drop(texture);
    assert!(!resource.is_deleted());
    assert!(heap.is_alive(handle));
    assert_eq!(heap.try_delete_requests(), 0);
    assert!(runtime.lookup(handle).unwrap().same_object(&*resource));
}

#[test]
fn test_replacing_registry_owned_binding() {
    static NODE: ProxyKind = ProxyKind::derived("Node", &REF_COUNTED).with_strong_by_default(true);
    static SCENE: ProxyKind = ProxyKind::derived("Scene", &NODE);

    let (heap, runtime) = runtime();
    let handle = heap.create();
    drop(runtime.bind(handle, &NODE).unwrap());
    assert_eq!(runtime.registry().strength(handle), Some(Strength::Strong));

    let scene = runtime.bind(handle, &SCENE).unwrap();
    assert!(!scene.is_deleted());
    assert!(heap.is_alive(handle));
    assert!(runtime.lookup(handle).unwrap().same_object(&*scene));
}

#[test]
fn test_null_handle_never_registers() {
    let (_heap, runtime) = runtime();
    let err = runtime.bind(Handle::NULL, &TEXTURE).unwrap_err();
    assert_eq!(err, BindingError::InvalidHandle { kind: "Texture" });
    assert!(runtime.registry().is_empty());
}

#[test]
fn test_shutdown_drains_registry_and_silences_finalizers() {
    let (heap, runtime) = runtime();
    let deleted = Arc::new(AtomicUsize::new(0));

    let weak_handle = heap.create();
    let held = texture(&runtime, weak_handle, &deleted);
    let strong_handle = heap.create();
    heap.add_ref(strong_handle).unwrap();
    let _ = texture(&runtime, strong_handle, &deleted);

    runtime.shutdown();
    assert_eq!(runtime.state(), RuntimeState::ShuttingDown);
    assert!(runtime.registry().is_empty());

    drop(held);
    assert_eq!(heap.try_delete_requests(), 0);
    assert_eq!(deleted.load(Ordering::SeqCst), 0);

    let handle = heap.create();
    assert_eq!(
        runtime.bind(handle, &TEXTURE).unwrap_err(),
        BindingError::ShuttingDown { handle }
    );
}

#[test]
fn test_initialize_shutdown_reentry() {
    let (heap, runtime) = runtime();
    assert_eq!(runtime.state(), RuntimeState::Initialized);

    runtime.shutdown();
    runtime.initialize();
    assert_eq!(runtime.state(), RuntimeState::Initialized);

    let handle = heap.create();
    let object = runtime.bind(handle, &TEXTURE).unwrap();
    assert!(runtime.registry().contains(handle));

    drop(object);
    assert!(!runtime.registry().contains(handle));
    assert!(!heap.is_alive(handle));
}

#[test]
fn test_handle_reuse_keeps_newer_proxy() {
    let (heap, runtime) = runtime();
    let handle = heap.create();
    let old = runtime.bind(handle, &TEXTURE).unwrap();

    // 原生对象被删除后地址被复用
    heap.destroy(handle);
    assert!(old.is_deleted());
    let reused = heap.create();
    assert_eq!(reused, handle);
    let new = runtime.bind(reused, &MESH).unwrap();

    drop(old);
    let current = runtime.lookup(handle).unwrap();
    assert!(current.same_object(&*new));
}

#[test]
fn test_runtime_from_config() {
    let heap = Arc::new(NativeHeap::new());
    let mut config = InteropConfig::default();
    config.registry.shards = 5;

    let runtime = Runtime::from_config(heap.clone(), &config);
    assert!(runtime.is_setup());
    assert_eq!(runtime.registry().shard_count(), 8);
    assert_eq!(heap.callback_installs(), 1);
    assert!(!runtime.setup());
}

struct Game {
    initialized: AtomicUsize,
    shut_down: AtomicUsize,
}

impl Application for Game {
    fn initialize(&self) {
        self.initialized.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        self.shut_down.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_application_bootstrap_brackets_runtime() -> anyhow::Result<()> {
    let heap = Arc::new(NativeHeap::new());
    let config = InteropConfig::default();
    let runtime = Runtime::from_config(heap.clone(), &config);
    let host = ApplicationHost::new(runtime, config.application.clone());

    let app_handle = heap.create();
    let game = Arc::new(Game {
        initialized: AtomicUsize::new(0),
        shut_down: AtomicUsize::new(0),
    });
    host.register(app_handle, game.clone());

    host.on_native_initialize(app_handle)?;
    let texture = host.runtime().bind(heap.create(), &TEXTURE)?;
    assert_eq!(host.runtime().registry().len(), 1);

    host.on_native_exiting(app_handle)?;
    assert!(host.runtime().registry().is_empty());
    drop(texture);
    assert_eq!(heap.try_delete_requests(), 0);

    assert_eq!(game.initialized.load(Ordering::SeqCst), 1);
    assert_eq!(game.shut_down.load(Ordering::SeqCst), 1);
    Ok(())
}
