use engine_interop::app::ApplicationHost;
use engine_interop::bindings::{NativeApi, Runtime};
use engine_interop::native::{NativeHeap, NativeLibrary};
use engine_interop::platform::PlatformId;
use engine_interop::{logging, InteropConfig};
use std::sync::Arc;

fn main() {
    let config = InteropConfig::load_or_default();
    logging::init(&config.logging);

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let native: Arc<dyn NativeApi> = match &config.runtime.native_library {
        Some(path) => match NativeLibrary::open(path) {
            Ok(library) => Arc::new(library),
            Err(e) => {
                eprintln!("Native library failed to load: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::info!(target: "interop", "no native library configured, using in-process heap");
            Arc::new(NativeHeap::new())
        }
    };

    let runtime = Runtime::from_config(native, &config);
    let host = ApplicationHost::new(runtime, config.application.clone());
    tracing::info!(
        target: "interop",
        "{} on {} ({:?}): {:?}",
        host.settings().name,
        PlatformId::current(),
        PlatformId::current().family(),
        host.runtime()
    );
}
