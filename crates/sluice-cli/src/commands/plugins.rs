//! List registered plugins

use sluice_core::Registry;
use sluice_runtime::plugins;

/// Print the built-in plugins by kind
pub fn run() {
    let registry = Registry::global();
    plugins::register_all(&registry);

    for (kind, names) in [
        ("inlets", registry.inlets.names()),
        ("flows", registry.flows.names()),
        ("outlets", registry.outlets.names()),
    ] {
        println!("{kind}:");
        for name in names {
            println!("  {name}");
        }
    }
}
