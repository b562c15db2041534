use crate::{
    key::ModuleKey,
    loader::{Loader, Subscription, UnitReqs},
};
use std::{collections::HashSet, sync::Arc};

/// A renderable unit.
pub trait Component: UnitReqs {
    type Props;
    type Output;

    fn render(&self, props: Self::Props) -> Self::Output;
}

/// Renders `unit` with `props` untouched, or yields the empty placeholder (`None`)
/// while the unit is not available yet.
pub fn render_unit<C: Component>(
    key: &ModuleKey,
    unit: Option<&C>,
    props: C::Props,
) -> Option<C::Output> {
    match unit {
        Some(unit) => Some(unit.render(props)),
        None => {
            log::trace!("Rendering placeholder for {}", key);
            None
        }
    }
}

/// Ordered record of the module keys rendered during one server-side pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsageLedger {
    keys: Vec<ModuleKey>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: ModuleKey) {
        log::trace!("Recording use of {}", key);
        self.keys.push(key);
    }

    pub fn keys(&self) -> &[ModuleKey] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in first-use order, each listed once.
    pub fn distinct(&self) -> Vec<ModuleKey> {
        let mut seen = HashSet::new();
        self.keys
            .iter()
            .filter(|key| seen.insert(*key))
            .cloned()
            .collect()
    }

    pub fn into_keys(self) -> Vec<ModuleKey> {
        self.keys
    }
}

/// Component instance backed by a [`Loader`].
///
/// Renders the placeholder until the loader has a unit. A view created after the
/// unit was cached renders it straight away.
pub struct AsyncView<C: Component> {
    loader: Arc<Loader<C>>,
    unit: Option<Arc<C>>,
    pending: Option<Subscription<C>>,
}

impl<C: Component> AsyncView<C> {
    pub fn new(loader: Arc<Loader<C>>) -> Self {
        let unit = loader.currently_resolved();
        Self {
            loader,
            unit,
            pending: None,
        }
    }

    pub fn key(&self) -> &ModuleKey {
        self.loader.key()
    }

    pub fn is_ready(&self) -> bool {
        self.unit.is_some()
    }

    /// Starts resolution if the unit is not there yet.
    pub fn mount(&mut self) {
        if self.unit.is_none() && self.pending.is_none() {
            self.pending = Some(self.loader.clone().subscribe());
        }
    }

    /// Picks up a settled result without waiting. Returns `true` when the view
    /// changed and needs rendering again.
    pub fn poll(&mut self) -> bool {
        let unit = match self.pending.as_mut().and_then(Subscription::try_take) {
            Some(unit) => unit,
            None => return false,
        };

        self.pending = None;
        self.unit = Some(unit);
        true
    }

    /// Waits for a pending resolution started by [`mount`](Self::mount).
    pub async fn settled(&mut self) {
        if let Some(pending) = self.pending.take() {
            if let Some(unit) = pending.settled().await {
                self.unit = Some(unit);
            }
        }
    }

    /// Drops interest in a pending result. A unit arriving later is not applied.
    pub fn unmount(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.revoke();
        }
    }

    pub fn render(&self, props: C::Props) -> Option<C::Output> {
        render_unit(self.loader.key(), self.unit.as_deref(), props)
    }
}

/// Component instance whose unit is already available.
///
/// Used for server-side passes: every render is recorded in the supplied ledger so
/// the client knows which units to preload.
pub struct EagerView<C: Component> {
    key: ModuleKey,
    unit: Arc<C>,
}

impl<C: Component> EagerView<C> {
    pub fn new(key: impl Into<ModuleKey>, unit: Arc<C>) -> Self {
        Self {
            key: key.into(),
            unit,
        }
    }

    /// Eager view over a loader's cached unit, or `None` if it has not resolved yet.
    pub fn from_loader(loader: &Loader<C>) -> Option<Self> {
        let unit = loader.currently_resolved()?;
        Some(Self::new(loader.key(), unit))
    }

    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    pub fn render(&self, props: C::Props, ledger: Option<&mut UsageLedger>) -> C::Output {
        if let Some(ledger) = ledger {
            ledger.record(self.key.clone());
        }
        self.unit.render(props)
    }
}
