//! Deriving facets and reporting out-of-band faults.
//!
//! Shows `map_results`/`map_errors` delegation, the report hook (a fault
//! with no associated call), and `LiveStream::fixed` as a controller-free
//! default bundle.
//!
//! Run with: `cargo run --example derived_facets`

use futures::stream;
use futures::StreamExt;

use callstream::{map_errors, map_results, CallController, Fault, LiveStream};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let live = CallController::spawn(|hooks| {
        // A collaborator-side failure with no call attached.
        hooks.report("cache miss, recomputing");
        stream::iter(vec![1u32, 2, 3]).boxed()
    });

    // Transform one facet each; loading and retry stay with the origin.
    let tagged = map_errors(&live, |errors| {
        errors
            .map(|fault| Fault::msg(format!("search: {fault}")))
            .boxed()
    });
    let doubled = map_results(&tagged, |results| results.map(|n| n * 2).boxed());

    let mut errors = doubled.errors();
    let mut results = doubled.results();

    println!(
        "results: {:?} {:?} {:?}",
        results.next().await,
        results.next().await,
        results.next().await,
    );
    println!(
        "reported fault: {:?}",
        errors.next().await.map(|fault| fault.to_string()),
    );

    // A controller-free bundle for defaults and tests.
    let fallback = LiveStream::fixed(vec![0u32]);
    println!(
        "fallback results: {:?}",
        fallback.results().collect::<Vec<_>>().await,
    );
}
