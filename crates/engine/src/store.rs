//! PlanBStore: shape registry and typed facade
//!
//! A store owns a data directory holding `planb.toml` and one LMDB
//! environment per registered shape:
//!
//! ```text
//! <data_dir>/
//!   planb.toml
//!   <shape>/data.mdb    primary + dictionary databases
//!   <shape>/lock.mdb
//! ```
//!
//! Shapes are registered once at startup and looked up by name. Each
//! registration keeps three views of the same shape: the typed
//! `ShapeDb<K, V>` used by `put`/`get`/`lookup`, the concrete handle
//! (e.g. [`SessionDb`]) returned by [`PlanBStore::shape`], and the
//! type-erased [`ShapeMaintenance`] used by sweeps and shutdown.

use std::any::{type_name, Any};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use planb_core::{
    hash_factory, Cancellation, Error, HashFactory, QueryField, Result, TemporalIndex,
    TemporalPrecision, ZoneId,
};
use planb_storage::SweepStats;

use crate::config::{PlanBConfig, CONFIG_FILE_NAME};
use crate::shape::{Shape, ShapeContext, ShapeDb, ShapeDescriptor, ShapeInfo, ShapeMaintenance};
use crate::shapes::{RangedStateDb, SessionDb, StateDb, TemporalCountDb};

struct RegisteredShape {
    /// `Arc<ShapeDb<K, V>>`
    db: Arc<dyn Any + Send + Sync>,
    /// The concrete handle, or the `ShapeDb` itself for generic shapes
    handle: Arc<dyn Any + Send + Sync>,
    maintenance: Arc<dyn ShapeMaintenance>,
}

/// Registry of the shapes stored under one data directory.
pub struct PlanBStore {
    data_dir: PathBuf,
    config: PlanBConfig,
    hash_factory: Arc<dyn HashFactory>,
    shapes: DashMap<String, RegisteredShape>,
}

impl PlanBStore {
    /// Open a store in `data_dir`, creating the directory and a default
    /// `planb.toml` if missing.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let config_path = data_dir.join(CONFIG_FILE_NAME);
        PlanBConfig::write_default_if_missing(&config_path)?;
        let config = PlanBConfig::from_file(&config_path)?;
        Self::open_with_config(data_dir, config)
    }

    /// Open a store in `data_dir` with an explicit config.
    ///
    /// `planb.toml` is neither read nor written.
    pub fn open_with_config(data_dir: impl AsRef<Path>, config: PlanBConfig) -> Result<Self> {
        config.validate()?;
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        info!(
            target: "planb::env",
            path = %data_dir.display(),
            hash_length = ?config.hash_length,
            "Opened store"
        );
        Ok(PlanBStore {
            data_dir,
            hash_factory: hash_factory(config.hash_length),
            config,
            shapes: DashMap::new(),
        })
    }

    /// Data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Active configuration.
    pub fn config(&self) -> &PlanBConfig {
        &self.config
    }

    // ========================================================================
    // Registration
    // ========================================================================

    fn check_name(name: &str) -> Result<()> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && name != CONFIG_FILE_NAME;
        if valid {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!("invalid shape name '{}'", name)))
        }
    }

    fn context(&self, name: &str) -> Result<ShapeContext> {
        ShapeContext::open(
            name,
            self.data_dir.join(name),
            self.config.env_settings(),
            Arc::clone(&self.hash_factory),
            self.config.inline_threshold,
        )
    }

    /// Register a shape built from `ctx` under `name`.
    ///
    /// The registry entry stays locked while the shape opens, so two
    /// registrations of one name never open the same environment twice.
    fn insert<S: Any + Send + Sync>(
        &self,
        name: &str,
        build: impl FnOnce(&ShapeContext) -> Result<(Arc<S>, RegisteredShape)>,
    ) -> Result<Arc<S>> {
        Self::check_name(name)?;
        match self.shapes.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::DuplicateShape(name.to_string())),
            Entry::Vacant(slot) => {
                let ctx = self.context(name)?;
                let (handle, registered) = build(&ctx)?;
                slot.insert(registered);
                debug!(
                    target: "planb::shape",
                    shape = name,
                    kind = type_name::<S>(),
                    "Registered shape"
                );
                Ok(handle)
            }
        }
    }

    fn register_shape<S: Shape>(
        &self,
        name: &str,
        open: impl FnOnce(&ShapeContext) -> Result<S>,
    ) -> Result<Arc<S>> {
        self.insert(name, |ctx| {
            let shape = Arc::new(open(ctx)?);
            let db = Arc::clone(shape.db());
            let registered = RegisteredShape {
                db: db.clone(),
                handle: shape.clone(),
                maintenance: db,
            };
            Ok((shape, registered))
        })
    }

    /// Register a shape from its codecs and catalogue.
    pub fn register<K, V>(
        &self,
        name: &str,
        describe: impl FnOnce(&ShapeContext) -> ShapeDescriptor<K, V>,
    ) -> Result<Arc<ShapeDb<K, V>>>
    where
        K: 'static,
        V: 'static,
    {
        self.insert(name, |ctx| {
            let db = Arc::new(ShapeDb::open(ctx, describe(ctx))?);
            let registered = RegisteredShape {
                db: db.clone(),
                handle: db.clone(),
                maintenance: db.clone(),
            };
            Ok((db, registered))
        })
    }

    /// Register a State shape.
    pub fn register_state(&self, name: &str) -> Result<Arc<StateDb>> {
        self.register_shape(name, StateDb::open)
    }

    /// Register a Session shape storing times at `precision`.
    pub fn register_session(
        &self,
        name: &str,
        precision: TemporalPrecision,
    ) -> Result<Arc<SessionDb>> {
        self.register_shape(name, |ctx| SessionDb::open(ctx, precision))
    }

    /// Register a TemporalCount shape bucketing with `index` in `zone`.
    ///
    /// An unusable index is rejected before the shape directory exists.
    pub fn register_temporal_count(
        &self,
        name: &str,
        index: Arc<dyn TemporalIndex>,
        zone: ZoneId,
    ) -> Result<Arc<TemporalCountDb>> {
        TemporalCountDb::check_index(index.as_ref())?;
        self.register_shape(name, |ctx| TemporalCountDb::open(ctx, index, zone))
    }

    /// Register a RangedState shape.
    pub fn register_ranged_state(&self, name: &str) -> Result<Arc<RangedStateDb>> {
        self.register_shape(name, RangedStateDb::open)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    fn entry<R>(&self, name: &str, f: impl FnOnce(&RegisteredShape) -> R) -> Result<R> {
        self.shapes
            .get(name)
            .map(|entry| f(entry.value()))
            .ok_or_else(|| Error::UnknownShape(name.to_string()))
    }

    /// The concrete handle of shape `name`, e.g. `shape::<SessionDb>("s")`.
    pub fn shape<S: Any + Send + Sync>(&self, name: &str) -> Result<Arc<S>> {
        self.entry(name, |entry| Arc::clone(&entry.handle))?
            .downcast::<S>()
            .map_err(|_| Error::ShapeTypeMismatch {
                shape: name.to_string(),
                expected: type_name::<S>(),
            })
    }

    /// The typed store of shape `name`.
    pub fn db<K: 'static, V: 'static>(&self, name: &str) -> Result<Arc<ShapeDb<K, V>>> {
        self.entry(name, |entry| Arc::clone(&entry.db))?
            .downcast::<ShapeDb<K, V>>()
            .map_err(|_| Error::ShapeTypeMismatch {
                shape: name.to_string(),
                expected: type_name::<ShapeDb<K, V>>(),
            })
    }

    /// Field catalogue of shape `name`.
    pub fn fields(&self, name: &str) -> Result<&'static [QueryField]> {
        self.entry(name, |entry| entry.maintenance.fields())
    }

    /// Registered shape names, sorted.
    pub fn shape_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shapes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    // ========================================================================
    // Typed access
    // ========================================================================

    /// Insert or replace one record of shape `name`.
    pub fn put<K: 'static, V: 'static>(&self, name: &str, key: &K, value: &V) -> Result<()> {
        self.db::<K, V>(name)?.put(key, value)
    }

    /// Decode the record of shape `name` stored under `key`.
    pub fn get<K: 'static, V: 'static>(&self, name: &str, key: &K) -> Result<Option<V>> {
        self.db::<K, V>(name)?.get(key)
    }

    /// Apply `f` to the raw stored value of `key` in shape `name`.
    pub fn lookup<K: 'static, V: 'static, R>(
        &self,
        name: &str,
        key: &K,
        f: impl FnOnce(Option<&[u8]>) -> R,
    ) -> Result<R> {
        self.db::<K, V>(name)?.lookup(key, f)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    fn maintenance(&self, name: &str) -> Result<Arc<dyn ShapeMaintenance>> {
        self.entry(name, |entry| Arc::clone(&entry.maintenance))
    }

    fn all_maintenance(&self) -> Vec<Arc<dyn ShapeMaintenance>> {
        let mut all: Vec<Arc<dyn ShapeMaintenance>> = self
            .shapes
            .iter()
            .map(|e| Arc::clone(&e.value().maintenance))
            .collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Sweep the dictionary of shape `name`.
    pub fn run_sweep(&self, name: &str, cancel: &Cancellation) -> Result<SweepStats> {
        self.maintenance(name)?.sweep(cancel)
    }

    /// Sweep every shape in name order.
    ///
    /// Stops early once `cancel` fires; shapes not reached are omitted.
    pub fn sweep_all(&self, cancel: &Cancellation) -> Vec<(String, Result<SweepStats>)> {
        let mut results = Vec::new();
        for shape in self.all_maintenance() {
            let result = shape.sweep(cancel);
            let cancelled = matches!(result, Err(Error::Cancelled));
            results.push((shape.name().to_string(), result));
            if cancelled {
                break;
            }
        }
        results
    }

    /// Record and dictionary counts of shape `name`.
    pub fn info(&self, name: &str) -> Result<ShapeInfo> {
        self.maintenance(name)?.info()
    }

    /// Number of records in shape `name`.
    pub fn count(&self, name: &str) -> Result<u64> {
        self.maintenance(name)?.count()
    }

    /// Close every shape. Later operations on them return `Error::Closed`.
    ///
    /// Attempts every shape and returns the first error.
    pub fn close(&self) -> Result<()> {
        let mut first_error = None;
        for shape in self.all_maintenance() {
            if let Err(e) = shape.close() {
                warn!(
                    target: "planb::env",
                    shape = shape.name(),
                    error = %e,
                    "Failed to close shape"
                );
                first_error.get_or_insert(e);
            }
        }
        info!(target: "planb::env", path = %self.data_dir.display(), "Closed store");
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for PlanBStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanBStore")
            .field("data_dir", &self.data_dir)
            .field("shapes", &self.shape_names())
            .finish()
    }
}
