//! Routing of producer fragments to buckets.

use crate::consumer::BucketId;
use crate::error::SegregateResult;
use tessera_core::MutationFragment;

/// Fragments routed for one input fragment, in emission order.
pub(crate) type Routed<B> = Vec<(B, MutationFragment)>;

/// Decides which bucket(s) each fragment of a validated stream goes to.
///
/// A router sees every producer fragment in order and appends the
/// fragments each bucket should receive to `out`. Per bucket, the appended
/// fragments must form a well-framed, ordered stream.
pub(crate) trait Router {
    /// Bucket identifier.
    type Bucket: BucketId;

    /// Routes one producer fragment.
    fn route(
        &mut self,
        fragment: MutationFragment,
        out: &mut Routed<Self::Bucket>,
    ) -> SegregateResult<()>;

    /// Closes the partition in progress, if any, on every bucket it was
    /// opened in. Used when a run is cancelled mid-partition.
    fn close_partition(&mut self, out: &mut Routed<Self::Bucket>);

    /// Returns true while a partition is open.
    fn in_partition(&self) -> bool;
}
