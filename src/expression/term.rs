use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use itertools::Itertools;
use log::debug;

use crate::algebra::{Ring, Semiring, Standard};
use crate::error::{Error, Result};
use crate::expression::IndexedView;
use crate::tensor::symmetry::symmetric_runs;
use crate::tensor::{Sym, Tensor};

/// Lifecycle of a [`Term`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermState {
    /// Combined through operators, nothing evaluated yet.
    Unbuilt,
    /// Currently being lowered into primitive calls.
    Executing,
    /// Executed. A consumed term cannot be executed again.
    Consumed,
}

enum TermOp<S: Semiring> {
    Leaf(IndexedView<S>),
    Sum(Vec<Term<S>>),
    Contract(Box<Term<S>>, Box<Term<S>>),
}

/// A node of an expression tree over indexed tensors.
///
/// Terms are built by combining [`IndexedView`]s with `+`, `-` and `*` and are
/// evaluated by assigning them to a destination view. Every term carries a
/// scale applied to its whole value.
pub struct Term<S: Semiring = Standard<f64>> {
    op: TermOp<S>,
    scale: S::Scalar,
    state: TermState,
}

/// Labels, edge lengths and symmetry of the value a term produces.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Signature {
    labels: Vec<char>,
    len: Vec<usize>,
    sym: Vec<Sym>,
}

impl Signature {
    fn of_view<S: Semiring>(view: &IndexedView<S>) -> Self {
        Self {
            labels: view.labels().to_vec(),
            len: view.tensor().shape().to_vec(),
            sym: view.tensor().symmetry().to_vec(),
        }
    }

    fn position(&self, label: char) -> Option<usize> {
        self.labels.iter().position(|l| *l == label)
    }

    fn contains(&self, label: char) -> bool {
        self.position(label).is_some()
    }
}

/// Builds the signature of a value carrying `labels`. Edge lengths are taken
/// from the first of `sources` that carries each label.
///
/// A symmetry tag survives only if every source carrying the label has the
/// same tag and the same partner label after it, and that partner follows it
/// in the result too. Other tags are downgraded to [`Sym::NS`].
fn merge(labels: Vec<char>, sources: &[&Signature]) -> Result<Signature> {
    for (first, second) in sources.iter().tuple_combinations() {
        for (label, len) in first.labels.iter().zip(&first.len) {
            if let Some(position) = second.position(*label) {
                if second.len[position] != *len {
                    return Err(Error::DimensionMismatch {
                        label: *label,
                        expected: *len,
                        got: second.len[position],
                    });
                }
            }
        }
    }

    let mut len = Vec::with_capacity(labels.len());
    let mut sym = Vec::with_capacity(labels.len());
    for (position, label) in labels.iter().enumerate() {
        let carriers = sources
            .iter()
            .filter_map(|source| source.position(*label).map(|dim| (*source, dim)))
            .collect_vec();
        let &(owner, dim) = carriers
            .first()
            .ok_or(Error::UnboundFreeIndex { label: *label })?;
        len.push(owner.len[dim]);

        let tag = owner.sym[dim];
        let partner = labels.get(position + 1);
        let agreed = carriers.iter().all(|(source, dim)| {
            source.sym[*dim] == tag
                && partner.is_some_and(|p| source.labels.get(dim + 1) == Some(p))
        });
        if !tag.is_symmetric() || agreed {
            sym.push(tag);
        } else {
            debug!(label:% = label, tag:? = tag; "Dropping symmetry not shared by every operand");
            sym.push(Sym::NS);
        }
    }

    Ok(Signature { labels, len, sym })
}

impl<S: Semiring> Term<S> {
    fn new(op: TermOp<S>) -> Self {
        Self {
            op,
            scale: S::one(),
            state: TermState::Unbuilt,
        }
    }

    /// Multiplies the scale of this term by `alpha`.
    #[must_use]
    pub fn scaled(mut self, alpha: S::Scalar) -> Self {
        self.scale = S::mul(alpha, self.scale);
        self
    }

    #[inline]
    pub fn scale(&self) -> S::Scalar {
        self.scale
    }

    #[inline]
    pub fn state(&self) -> TermState {
        self.state
    }

    /// Number of indexed views in this expression.
    pub fn leaf_count(&self) -> usize {
        match &self.op {
            TermOp::Leaf(_) => 1,
            TermOp::Sum(children) => children.iter().map(Term::leaf_count).sum(),
            TermOp::Contract(left, right) => left.leaf_count() + right.leaf_count(),
        }
    }

    /// Evaluates `dest = beta * dest + value(self)`.
    ///
    /// The labels of the whole tree are resolved and every primitive call is
    /// validated before any data is modified. Intermediates are released when
    /// this returns. The term is consumed afterwards, even if it failed.
    ///
    /// # Errors
    /// - [`Error::ReuseOfConsumedTerm`] if this term was executed before
    /// - the label and world errors of [`Tensor::contract`]
    pub fn execute(&mut self, dest: &IndexedView<S>, beta: S::Scalar) -> Result<()> {
        if self.state != TermState::Unbuilt {
            return Err(Error::ReuseOfConsumedTerm);
        }
        self.state = TermState::Executing;
        debug!(dest = dest.tensor().id(), expression:% = self; "Executing expression");
        let steps = self.lower(dest, beta);
        self.consume();

        let steps = steps?;
        for step in &steps {
            step.run()?;
        }
        Ok(())
    }

    fn consume(&mut self) {
        self.state = TermState::Consumed;
        match &mut self.op {
            TermOp::Leaf(_) => {}
            TermOp::Sum(children) => children.iter_mut().for_each(Term::consume),
            TermOp::Contract(left, right) => {
                left.consume();
                right.consume();
            }
        }
    }

    fn ensure_fresh(&self) -> Result<()> {
        let fresh = match &self.op {
            TermOp::Leaf(_) => true,
            TermOp::Sum(children) => children.iter().all(|c| c.ensure_fresh().is_ok()),
            TermOp::Contract(left, right) => {
                left.ensure_fresh().is_ok() && right.ensure_fresh().is_ok()
            }
        };
        if fresh && self.state != TermState::Consumed {
            Ok(())
        } else {
            Err(Error::ReuseOfConsumedTerm)
        }
    }

    /// Labels of all views in this expression, in order of first occurrence.
    fn mentioned(&self) -> Vec<char> {
        match &self.op {
            TermOp::Leaf(view) => view.labels().to_vec(),
            TermOp::Sum(children) => children
                .iter()
                .flat_map(Term::mentioned)
                .unique()
                .collect(),
            TermOp::Contract(left, right) => left
                .mentioned()
                .into_iter()
                .chain(right.mentioned())
                .unique()
                .collect(),
        }
    }

    /// Whether `tensor` is read anywhere in this expression.
    fn reads(&self, tensor: &Tensor<S>) -> bool {
        match &self.op {
            TermOp::Leaf(view) => view.tensor().same_tensor(tensor),
            TermOp::Sum(children) => children.iter().any(|c| c.reads(tensor)),
            TermOp::Contract(left, right) => left.reads(tensor) || right.reads(tensor),
        }
    }

    /// Infers the signature of the value of this term. `scope` holds the labels
    /// the enclosing expression still needs: a label shared by both sides of a
    /// contraction is kept when it is in scope and summed over otherwise.
    fn signature(&self, scope: &[char]) -> Result<Signature> {
        match &self.op {
            TermOp::Leaf(view) => Ok(Signature::of_view(view)),
            TermOp::Sum(children) => {
                let signatures = children
                    .iter()
                    .map(|c| c.signature(scope))
                    .collect::<Result<Vec<_>>>()?;
                let labels = signatures
                    .iter()
                    .flat_map(|s| s.labels.iter().copied())
                    .unique()
                    .collect();
                merge(labels, &signatures.iter().collect_vec())
            }
            TermOp::Contract(left, right) => {
                let left_sig = left.signature(&extend(scope, &right.mentioned()))?;
                let right_sig = right.signature(&extend(scope, &left.mentioned()))?;
                let labels = left_sig
                    .labels
                    .iter()
                    .copied()
                    .filter(|l| !right_sig.contains(*l) || scope.contains(l))
                    .chain(
                        right_sig
                            .labels
                            .iter()
                            .copied()
                            .filter(|l| !left_sig.contains(*l)),
                    )
                    .collect();
                merge(labels, &[&left_sig, &right_sig])
            }
        }
    }

    /// Resolves the whole tree into primitive calls writing into `dest`.
    fn lower(&self, dest: &IndexedView<S>, beta: S::Scalar) -> Result<Vec<Step<S>>> {
        self.ensure_fresh()?;
        let mut steps = Vec::new();
        if matches!(self.op, TermOp::Sum(_)) && self.reads(dest.tensor()) {
            // Later children would read what the first one overwrote.
            let staging =
                IndexedView::intermediate(dest.tensor().zeros_like(), dest.labels().to_vec());
            debug!(dest = dest.tensor().id(), staging = staging.tensor().id(); "Staging sum that reads its destination");
            self.plan(&staging, S::one(), S::zero(), &mut steps)?;
            Term::from(staging).plan(dest, S::one(), beta, &mut steps)?;
        } else {
            self.plan(dest, S::one(), beta, &mut steps)?;
        }
        Ok(steps)
    }

    fn plan(
        &self,
        dest: &IndexedView<S>,
        alpha: S::Scalar,
        beta: S::Scalar,
        steps: &mut Vec<Step<S>>,
    ) -> Result<()> {
        let alpha = S::mul(alpha, self.scale);
        match &self.op {
            TermOp::Leaf(view) => {
                let alpha = S::mul(alpha, view.scale());
                let target = dest.tensor();
                target.check_sum(view.tensor(), view.labels(), dest.labels())?;
                if view.tensor().same_tensor(target) && view.labels() == dest.labels() {
                    let alpha = if S::is_zero(beta) {
                        alpha
                    } else {
                        S::add(alpha, beta)
                    };
                    steps.push(Step::Scale {
                        alpha,
                        dest: dest.clone(),
                    });
                } else {
                    steps.push(Step::Sum {
                        alpha,
                        source: view.clone(),
                        beta,
                        dest: dest.clone(),
                    });
                }
            }
            TermOp::Sum(children) => {
                for (position, child) in children.iter().enumerate() {
                    let beta = if position == 0 { beta } else { S::one() };
                    child.plan(dest, alpha, beta, steps)?;
                }
            }
            TermOp::Contract(left, right) => {
                let left_view = left.operand(dest, &extend(dest.labels(), &right.mentioned()), steps)?;
                let right_view = right.operand(dest, &extend(dest.labels(), &left.mentioned()), steps)?;
                dest.tensor().check_contract(
                    left_view.tensor(),
                    left_view.labels(),
                    right_view.tensor(),
                    right_view.labels(),
                    dest.labels(),
                )?;
                steps.push(Step::Contract {
                    alpha: S::mul(alpha, S::mul(left_view.scale(), right_view.scale())),
                    left: left_view,
                    right: right_view,
                    beta,
                    dest: dest.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns a view holding the value of this term for use as an operand of
    /// a contraction. Nested expressions are materialised into an intermediate
    /// on the world of `dest`.
    fn operand(
        &self,
        dest: &IndexedView<S>,
        scope: &[char],
        steps: &mut Vec<Step<S>>,
    ) -> Result<IndexedView<S>> {
        if let TermOp::Leaf(view) = &self.op {
            return Ok(view.clone().scaled(self.scale));
        }
        let signature = self.signature(scope)?;
        let tensor = Tensor::new(&signature.len, &signature.sym, dest.tensor().world())?;
        debug!(
            id = tensor.id(),
            labels:% = signature.labels.iter().collect::<String>(),
            symmetric_runs:? = symmetric_runs(&signature.sym);
            "Materialising intermediate"
        );
        let intermediate = IndexedView::intermediate(tensor, signature.labels);
        self.plan(&intermediate, S::one(), S::zero(), steps)?;
        Ok(intermediate)
    }
}

/// `base` followed by the labels of `extra` it does not contain yet.
fn extend(base: &[char], extra: &[char]) -> Vec<char> {
    base.iter().chain(extra).copied().unique().collect()
}

/// A resolved primitive call.
enum Step<S: Semiring> {
    Sum {
        alpha: S::Scalar,
        source: IndexedView<S>,
        beta: S::Scalar,
        dest: IndexedView<S>,
    },
    Contract {
        alpha: S::Scalar,
        left: IndexedView<S>,
        right: IndexedView<S>,
        beta: S::Scalar,
        dest: IndexedView<S>,
    },
    Scale {
        alpha: S::Scalar,
        dest: IndexedView<S>,
    },
}

impl<S: Semiring> Step<S> {
    fn run(&self) -> Result<()> {
        match self {
            Step::Sum {
                alpha,
                source,
                beta,
                dest,
            } => dest.tensor().sum(
                *alpha,
                source.tensor(),
                &source.label_string(),
                *beta,
                &dest.label_string(),
            ),
            Step::Contract {
                alpha,
                left,
                right,
                beta,
                dest,
            } => dest.tensor().contract(
                *alpha,
                left.tensor(),
                &left.label_string(),
                right.tensor(),
                &right.label_string(),
                *beta,
                &dest.label_string(),
            ),
            Step::Scale { alpha, dest } => dest.tensor().scale(*alpha, &dest.label_string()),
        }
    }
}

impl<S: Semiring> From<IndexedView<S>> for Term<S> {
    fn from(view: IndexedView<S>) -> Self {
        Term::new(TermOp::Leaf(view))
    }
}

impl<S: Semiring> fmt::Display for Term<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !S::is_one(self.scale) {
            write!(f, "{:?}*", self.scale)?;
        }
        match &self.op {
            TermOp::Leaf(view) => write!(f, "{view}"),
            TermOp::Sum(children) => write!(f, "({})", children.iter().join(" + ")),
            TermOp::Contract(left, right) => write!(f, "({left} * {right})"),
        }
    }
}

impl<S: Semiring> fmt::Debug for Term<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Term")
            .field("expression", &self.to_string())
            .field("state", &self.state)
            .finish()
    }
}

impl<S: Semiring, R: Into<Term<S>>> Add<R> for Term<S> {
    type Output = Term<S>;

    fn add(self, rhs: R) -> Term<S> {
        let rhs = rhs.into();
        let mut children = Vec::new();
        for term in [self, rhs] {
            match term.op {
                TermOp::Sum(nested) if S::is_one(term.scale) => children.extend(nested),
                op => children.push(Term {
                    op,
                    scale: term.scale,
                    state: term.state,
                }),
            }
        }
        Term::new(TermOp::Sum(children))
    }
}

impl<S: Ring, R: Into<Term<S>>> Sub<R> for Term<S> {
    type Output = Term<S>;

    fn sub(self, rhs: R) -> Term<S> {
        let rhs: Term<S> = rhs.into();
        self + -rhs
    }
}

impl<S: Semiring, R: Into<Term<S>>> Mul<R> for Term<S> {
    type Output = Term<S>;

    fn mul(self, rhs: R) -> Term<S> {
        Term::new(TermOp::Contract(Box::new(self), Box::new(rhs.into())))
    }
}

impl<S: Ring> Neg for Term<S> {
    type Output = Term<S>;

    fn neg(mut self) -> Term<S> {
        self.scale = S::neg(self.scale);
        self
    }
}
