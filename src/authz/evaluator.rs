//! Incremental evaluation with early exit
//!
//! The evaluator interleaves attribute gathering with evaluation. It starts
//! with what is already resolved, then walks the contributors in order:
//!
//! 1. Re-resolve the leftovers with the attributes known so far
//! 2. Ask the next contributor for attributes and merge them in
//! 3. Re-resolve the original unresolved items with everything known
//!
//! Every pass yields a batch that is evaluated on the spot. The first
//! conclusive batch ends the evaluation and later contributors are never
//! called. Leftover passes repeat while they make progress, and a final one
//! after the last contributor settles the leftovers.

use super::context::{AttributeContributor, AuthContext};
use super::expression::{Attributes, Expression};
use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Outcome of checking a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriState {
    True,
    False,
    /// Cannot be decided from this item, keep looking
    Undefined,
}

impl TriState {
    pub fn is_conclusive(self) -> bool {
        self != TriState::Undefined
    }
}

impl From<Option<bool>> for TriState {
    fn from(verdict: Option<bool>) -> Self {
        match verdict {
            Some(true) => TriState::True,
            Some(false) => TriState::False,
            None => TriState::Undefined,
        }
    }
}

/// The item that decided an evaluation, tagged with its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decided<T> {
    Success(T),
    Failure(T),
}

impl<T> Decided<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Decided::Success(_))
    }

    pub fn item(&self) -> &T {
        match self {
            Decided::Success(item) | Decided::Failure(item) => item,
        }
    }

    pub fn into_item(self) -> T {
        match self {
            Decided::Success(item) | Decided::Failure(item) => item,
        }
    }
}

/// How a batch holding several conclusive items is decided
///
/// Batches are ordered sets, so "first" always means first in item order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// First conclusive item wins
    #[default]
    FirstConclusive,
    /// Any failing item wins over succeeding ones
    DenyOverrides,
    /// Any succeeding item wins over failing ones
    AllowOverrides,
}

impl ConflictStrategy {
    /// Whether an item with this outcome ends the batch without looking further
    fn wins_outright(self, state: TriState) -> bool {
        match self {
            ConflictStrategy::FirstConclusive => true,
            ConflictStrategy::DenyOverrides => state == TriState::False,
            ConflictStrategy::AllowOverrides => state == TriState::True,
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictStrategy::FirstConclusive => f.write_str("first-conclusive"),
            ConflictStrategy::DenyOverrides => f.write_str("deny-overrides"),
            ConflictStrategy::AllowOverrides => f.write_str("allow-overrides"),
        }
    }
}

/// Decides when an item concludes the evaluation and what it maps to
pub trait CompletionAdapter<T> {
    type Output;

    /// Whether items that still hold placeholders may be checked too
    fn supports_partial_completion(&self) -> bool {
        false
    }

    fn conflict_strategy(&self) -> ConflictStrategy {
        ConflictStrategy::FirstConclusive
    }

    fn completion(&self, item: &T) -> Result<TriState>;

    fn map_result(&self, decided: Decided<T>) -> Self::Output;
}

type Getter<V> = Box<dyn Fn(&AuthContext) -> V + Send + Sync>;
type Setter<V> = Box<dyn Fn(AuthContext, V) -> AuthContext + Send + Sync>;

/// Read/replace accessor pair for one field of the context
pub struct Lens<V> {
    get: Getter<V>,
    set: Setter<V>,
}

impl<V> Lens<V> {
    pub fn new<G, S>(get: G, set: S) -> Self
    where
        G: Fn(&AuthContext) -> V + Send + Sync + 'static,
        S: Fn(AuthContext, V) -> AuthContext + Send + Sync + 'static,
    {
        Lens {
            get: Box::new(get),
            set: Box::new(set),
        }
    }

    pub fn get(&self, context: &AuthContext) -> V {
        (self.get)(context)
    }

    pub fn set(&self, context: AuthContext, value: V) -> AuthContext {
        (self.set)(context, value)
    }
}

impl Lens<Attributes> {
    pub fn request_attributes() -> Self {
        Lens::new(
            |ctx| ctx.request_attributes().clone(),
            AuthContext::with_request_attributes,
        )
    }

    pub fn profile_attributes() -> Self {
        Lens::new(
            |ctx| ctx.profile_attributes().clone(),
            AuthContext::with_profile_attributes,
        )
    }
}

/// Result of an evaluation
#[derive(Debug)]
pub struct Evaluation<T, R> {
    /// Mapped result of the deciding item, `None` when nothing concluded
    pub result: Option<R>,
    /// Final context. Holds the deciding batch on a conclusive result,
    /// otherwise every item that ever resolved.
    pub context: AuthContext,
    /// Original items none of whose derived values ever resolved
    pub unresolved: BTreeSet<T>,
}

impl<T, R> Evaluation<T, R> {
    pub fn is_conclusive(&self) -> bool {
        self.result.is_some()
    }
}

/// One step of the evaluation plan
#[derive(Debug, Clone, Copy)]
enum Phase {
    Seed,
    Leftovers,
    Contribute(usize),
}

/// Items produced by one resolution pass
struct Batch<T> {
    resolved: BTreeSet<T>,
    unresolved: BTreeSet<T>,
}

impl<T: Ord> Batch<T> {
    fn empty() -> Self {
        Batch {
            resolved: BTreeSet::new(),
            unresolved: BTreeSet::new(),
        }
    }
}

/// Resolution bookkeeping across rounds
///
/// Every derived item carries the indexes of the originals it came from, so an
/// original counts as resolved once any descendant resolves.
struct Ledger<T> {
    originals: Vec<T>,
    leftovers: BTreeMap<T, BTreeSet<usize>>,
    resolved: BTreeSet<T>,
    settled: BTreeSet<usize>,
}

impl<T: Expression> Ledger<T> {
    fn seed(items: BTreeSet<T>) -> (Self, Batch<T>) {
        let (resolved, open): (BTreeSet<T>, BTreeSet<T>) =
            items.into_iter().partition(|item| item.is_fully_resolved());
        let originals: Vec<T> = open.iter().cloned().collect();
        let leftovers = originals
            .iter()
            .enumerate()
            .map(|(i, item)| (item.clone(), BTreeSet::from([i])))
            .collect();
        let batch = Batch {
            resolved: resolved.clone(),
            unresolved: open,
        };
        let ledger = Ledger {
            originals,
            leftovers,
            resolved,
            settled: BTreeSet::new(),
        };
        (ledger, batch)
    }

    /// Re-resolve the current leftovers, replacing them with what is still open
    ///
    /// The flag is false when the pass left the leftovers unchanged.
    fn resolve_leftovers(&mut self, attributes: &Attributes) -> (Batch<T>, bool) {
        if attributes.is_empty() || self.leftovers.is_empty() {
            return (Batch::empty(), false);
        }
        let leftovers = std::mem::take(&mut self.leftovers);
        let expanded = expand(leftovers.iter(), attributes);
        let (batch, open) = self.record(expanded);
        let progressed = open != leftovers;
        self.leftovers = open;
        (batch, progressed)
    }

    /// Re-resolve the originals, adding whatever stays open to the leftovers
    fn resolve_originals(&mut self, attributes: &Attributes) -> Batch<T> {
        if attributes.is_empty() || self.originals.is_empty() {
            return Batch::empty();
        }
        let lineages: Vec<BTreeSet<usize>> =
            (0..self.originals.len()).map(|i| BTreeSet::from([i])).collect();
        let expanded = expand(self.originals.iter().zip(lineages.iter()), attributes);
        let (batch, open) = self.record(expanded);
        for (item, lineage) in open {
            self.leftovers.entry(item).or_default().extend(lineage);
        }
        batch
    }

    fn record(
        &mut self,
        expanded: BTreeMap<T, BTreeSet<usize>>,
    ) -> (Batch<T>, BTreeMap<T, BTreeSet<usize>>) {
        let mut batch = Batch::empty();
        let mut open = BTreeMap::new();
        for (item, lineage) in expanded {
            if item.is_fully_resolved() {
                self.settled.extend(lineage.iter().copied());
                self.resolved.insert(item.clone());
                batch.resolved.insert(item);
            } else {
                batch.unresolved.insert(item.clone());
                open.insert(item, lineage);
            }
        }
        (batch, open)
    }

    fn unresolved(&self) -> BTreeSet<T> {
        self.originals
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.settled.contains(i))
            .map(|(_, item)| item.clone())
            .collect()
    }
}

fn expand<'a, T, I>(items: I, attributes: &Attributes) -> BTreeMap<T, BTreeSet<usize>>
where
    T: Expression + 'a,
    I: Iterator<Item = (&'a T, &'a BTreeSet<usize>)>,
{
    let mut expanded: BTreeMap<T, BTreeSet<usize>> = BTreeMap::new();
    for (item, lineage) in items {
        for derived in item.enhance_all(attributes) {
            expanded
                .entry(derived)
                .or_default()
                .extend(lineage.iter().copied());
        }
    }
    expanded
}

/// Generic incremental evaluator
///
/// `working_set` reads and replaces the items inside the context,
/// `attributes` the attribute set the contributors feed.
pub struct IncrementalEvaluator<T, A> {
    working_set: Lens<BTreeSet<T>>,
    attributes: Lens<Attributes>,
    contributors: Vec<Arc<dyn AttributeContributor>>,
    adapter: A,
}

impl<T, A> IncrementalEvaluator<T, A>
where
    T: Expression + fmt::Debug,
    A: CompletionAdapter<T>,
{
    pub fn new(
        working_set: Lens<BTreeSet<T>>,
        attributes: Lens<Attributes>,
        contributors: Vec<Arc<dyn AttributeContributor>>,
        adapter: A,
    ) -> Self {
        IncrementalEvaluator {
            working_set,
            attributes,
            contributors,
            adapter,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Run the evaluation plan against `context`
    pub fn evaluate(&self, context: AuthContext) -> Result<Evaluation<T, A::Output>> {
        let mut attributes = self.attributes.get(&context);
        let (mut ledger, seeded) = Ledger::seed(self.working_set.get(&context));
        let mut context = context;
        let mut pending = Some(seeded);

        for phase in self.plan() {
            // Each leftover pass applies one key per placeholder, so the pass
            // repeats while it makes progress, at most once per attribute key.
            let mut passes = match phase {
                Phase::Leftovers => attributes.by_key().len().max(1),
                Phase::Seed | Phase::Contribute(_) => 1,
            };
            while passes > 0 {
                passes -= 1;
                let batch = match phase {
                    Phase::Seed => pending.take().unwrap_or_else(Batch::empty),
                    Phase::Leftovers => {
                        let (batch, progressed) = ledger.resolve_leftovers(&attributes);
                        if !progressed {
                            passes = 0;
                        }
                        batch
                    }
                    Phase::Contribute(index) => {
                        let contributor = &self.contributors[index];
                        let contribution =
                            contributor.contribute(&context).map_err(|source| {
                                AuthzError::Contributor {
                                    contributor: index,
                                    source,
                                }
                            })?;
                        let before = attributes.len();
                        attributes.extend(contribution.attributes.iter().cloned());
                        debug!(
                            "Contributor {} ({}) attributes count: {} -> {}",
                            index,
                            contribution.contributor_id,
                            contribution.attributes.len(),
                            attributes.len()
                        );
                        if attributes.len() != before {
                            context = self.attributes.set(context, attributes.clone());
                        }
                        ledger.resolve_originals(&attributes)
                    }
                };

                debug!(
                    "{:?}: resolved {}, unresolved {}, leftovers {}",
                    phase,
                    batch.resolved.len(),
                    batch.unresolved.len(),
                    ledger.leftovers.len()
                );

                let candidates = self.candidates(batch);
                if let Some(decided) = self.decide(&candidates)? {
                    debug!("{:?} concluded with {:?}", phase, decided);
                    let context = self.working_set.set(context, candidates);
                    return Ok(Evaluation {
                        result: Some(self.adapter.map_result(decided)),
                        context,
                        unresolved: ledger.unresolved(),
                    });
                }
                context = self.working_set.set(context, ledger.resolved.clone());
            }
        }

        let unresolved = ledger.unresolved();
        debug!(
            "Evaluation inconclusive: resolved {}, unresolved {}",
            ledger.resolved.len(),
            unresolved.len()
        );
        Ok(Evaluation {
            result: None,
            context,
            unresolved,
        })
    }

    fn plan(&self) -> Vec<Phase> {
        let mut plan = Vec::with_capacity(self.contributors.len() * 2 + 2);
        plan.push(Phase::Seed);
        for index in 0..self.contributors.len() {
            plan.push(Phase::Leftovers);
            plan.push(Phase::Contribute(index));
        }
        plan.push(Phase::Leftovers);
        plan
    }

    fn candidates(&self, batch: Batch<T>) -> BTreeSet<T> {
        let Batch {
            mut resolved,
            unresolved,
        } = batch;
        if self.adapter.supports_partial_completion() {
            resolved.extend(unresolved);
        }
        resolved
    }

    fn decide(&self, candidates: &BTreeSet<T>) -> Result<Option<Decided<T>>> {
        let strategy = self.adapter.conflict_strategy();
        let mut fallback = None;
        for item in candidates {
            let state = self.adapter.completion(item)?;
            if !state.is_conclusive() {
                continue;
            }
            let decided = if state == TriState::True {
                Decided::Success(item.clone())
            } else {
                Decided::Failure(item.clone())
            };
            if strategy.wins_outright(state) {
                return Ok(Some(decided));
            }
            fallback.get_or_insert(decided);
        }
        Ok(fallback)
    }
}
