//! Connection handlers that register the hstore type adapter.
//!
//! A database driver calls [`ConnectionHandlerRegistry::dispatch`] each time
//! it opens a connection. Handlers are either *generic*, run on every
//! connection, or *unique*, run on the next connection only and then
//! dropped. The hstore handler installed by [`register_hstore_handler`]
//! decides, per connection, whether the adapter should be registered and in
//! which scope; the driver acts on the returned [`HandlerOutcome`].

use std::sync::{Arc, Mutex, RwLock};

use hstore_rs_core::{AdapterRegistration, DatabaseSettings, SETTINGS};

/// Name under which the hstore handler is attached.
pub const HSTORE_HANDLER: &str = "register_hstore";

/// What the driver knows about a freshly opened connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// The database alias.
    pub alias: String,
    /// The backend vendor, e.g. `"postgresql"` or `"sqlite"`.
    pub vendor: String,
    /// The alias' settings.
    pub settings: DatabaseSettings,
}

impl ConnectionInfo {
    /// Describes a connection to `alias`; the vendor is derived from the
    /// configured engine.
    pub fn new(alias: impl Into<String>, settings: DatabaseSettings) -> Self {
        let vendor = if settings.is_postgresql() {
            "postgresql".to_string()
        } else {
            settings
                .engine
                .rsplit('.')
                .next()
                .unwrap_or_default()
                .to_string()
        };
        Self {
            alias: alias.into(),
            vendor,
            settings,
        }
    }
}

/// The result of running one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The handler did nothing for this connection.
    Skipped,
    /// The handler re-attached itself to run on a later connection.
    Deferred,
    /// The hstore adapter should be registered on this connection.
    Register {
        /// The database alias.
        alias: String,
        /// Global or per-connection registration.
        scope: AdapterRegistration,
    },
}

/// The type signature of a connection handler.
pub type ConnectionHandler =
    Arc<dyn Fn(&ConnectionHandlerRegistry, &ConnectionInfo) -> HandlerOutcome + Send + Sync>;

/// Generic and single-shot connection handlers.
#[derive(Default)]
pub struct ConnectionHandlerRegistry {
    generic: RwLock<Vec<(String, ConnectionHandler)>>,
    unique: Mutex<Vec<(String, ConnectionHandler)>>,
}

impl std::fmt::Debug for ConnectionHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandlerRegistry")
            .field("generic", &self.generic_count())
            .field("unique", &self.unique_count())
            .finish()
    }
}

impl ConnectionHandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a handler. A unique handler runs on the next dispatch only.
    pub fn attach(&self, name: impl Into<String>, handler: ConnectionHandler, unique: bool) {
        let name = name.into();
        tracing::trace!(handler = %name, unique, "attaching connection handler");
        if unique {
            self.unique
                .lock()
                .expect("handler lock poisoned")
                .push((name, handler));
        } else {
            self.generic
                .write()
                .expect("handler lock poisoned")
                .push((name, handler));
        }
    }

    /// Runs the pending unique handlers, then the generic ones, and returns
    /// their outcomes. A handler attached under the same name more than once
    /// runs once per dispatch.
    ///
    /// No lock is held while handlers run, so a handler may attach further
    /// handlers; those run on the next dispatch.
    pub fn dispatch(&self, connection: &ConnectionInfo) -> Vec<HandlerOutcome> {
        let mut handlers: Vec<(String, ConnectionHandler)> =
            std::mem::take(&mut *self.unique.lock().expect("handler lock poisoned"));
        handlers.extend(
            self.generic
                .read()
                .expect("handler lock poisoned")
                .iter()
                .cloned(),
        );

        let mut seen: Vec<String> = Vec::with_capacity(handlers.len());
        let mut outcomes = Vec::with_capacity(handlers.len());
        for (name, handler) in handlers {
            if seen.contains(&name) {
                continue;
            }
            let outcome = handler(self, connection);
            tracing::debug!(handler = %name, alias = %connection.alias, ?outcome, "connection handler ran");
            outcomes.push(outcome);
            seen.push(name);
        }
        outcomes
    }

    /// Number of generic handlers.
    pub fn generic_count(&self) -> usize {
        self.generic.read().expect("handler lock poisoned").len()
    }

    /// Number of pending unique handlers.
    pub fn unique_count(&self) -> usize {
        self.unique.lock().expect("handler lock poisoned").len()
    }
}

/// Builds the hstore handler for the given registration scope.
///
/// The handler skips connections that are not PostgreSQL or whose settings
/// disable hstore. When the database name is not known yet it re-attaches
/// itself, as a unique handler when registering globally.
pub fn hstore_handler(scope: AdapterRegistration) -> ConnectionHandler {
    Arc::new(move |registry: &ConnectionHandlerRegistry, connection: &ConnectionInfo| {
        if connection.vendor != "postgresql" || !connection.settings.has_hstore {
            return HandlerOutcome::Skipped;
        }
        if connection.settings.name.is_none() {
            registry.attach(HSTORE_HANDLER, hstore_handler(scope), scope.is_global());
            return HandlerOutcome::Deferred;
        }
        HandlerOutcome::Register {
            alias: connection.alias.clone(),
            scope,
        }
    })
}

/// Attaches the hstore handler using the scope from the global settings
/// (global when settings are not configured).
pub fn register_hstore_handler(registry: &ConnectionHandlerRegistry) {
    let scope = SETTINGS
        .try_get()
        .map(|s| s.adapter_registration)
        .unwrap_or_default();
    registry.attach(HSTORE_HANDLER, hstore_handler(scope), scope.is_global());
}
