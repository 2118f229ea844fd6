//! Built-in plugins
//!
//! | kind   | name          | notes                                      |
//! |--------|---------------|--------------------------------------------|
//! | inlet  | `static`      | push; emits configured `records`           |
//! | inlet  | `counter`     | periodic; emits an increasing counter      |
//! | flow   | `passthrough` | identity                                   |
//! | flow   | `filter`      | keeps or drops records matching `when`     |
//! | flow   | `merge`       | joins records sharing a time window        |
//! | outlet | `stdout`      | one line per record                        |
//! | outlet | `log`         | one tracing event per record               |

use sluice_core::{Registry, Source};

mod flow;
mod inlet;
mod merge;
mod outlet;

pub use flow::{Filter, Passthrough};
pub use inlet::{Counter, StaticRecords};
pub use merge::Merge;
pub use outlet::{LogOutlet, Stdout};

/// Register every built-in plugin. Names already taken are left alone.
pub fn register_all(registry: &Registry) {
    registry.register_inlet("static", |ctx| Ok(Source::push(StaticRecords::from_context(ctx)?)));
    registry.register_inlet("counter", |ctx| {
        let counter = Counter::from_context(ctx);
        let interval = counter.interval();
        Ok(Source::periodic(counter, interval))
    });

    registry.register_flow("passthrough", |ctx| Ok(Box::new(Passthrough::from_context(ctx))));
    registry.register_flow("filter", |ctx| Ok(Box::new(Filter::from_context(ctx)?)));
    registry.register_flow("merge", |ctx| Ok(Box::new(Merge::from_context(ctx))));

    registry.register_outlet("stdout", |_| Ok(Box::new(Stdout::default())));
    registry.register_outlet("log", |ctx| Ok(Box::new(LogOutlet::from_context(ctx))));
}
