use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

use tagalloc::{BufferRegion, TagAllocator};

fn buffer_allocator(capacity: usize) -> TagAllocator<BufferRegion> {
  let mut allocator = TagAllocator::new(BufferRegion::new(capacity));
  allocator.init().expect("region refused the init padding");
  allocator
}

//  Allocate-Deallocate Round-Trip
//
//  Repeatedly allocates and immediately frees one block. After the first
//  iteration the freed block sits at the free-list head, so this measures the
//  reuse fast path: first-fit hit plus LIFO push.
fn round_trip(c: &mut Criterion) {
  c.bench_function("allocate-deallocate round trip", |b| {
    let mut allocator = buffer_allocator(1 << 20);

    b.iter(|| unsafe {
      let p = allocator.allocate(black_box(64));
      allocator.deallocate(p);
    });
  });
}

//  Churn With Holes
//
//  Allocates a batch of mixed-size blocks, frees every other one to punch
//  holes, backfills the holes, then releases everything. Exercises split,
//  coalesce, and list maintenance together rather than any single fast path.
fn churn(c: &mut Criterion) {
  c.bench_function("mixed-size churn", |b| {
    b.iter_batched_ref(
      || buffer_allocator(1 << 20),
      |allocator| unsafe {
        let mut live = Vec::with_capacity(64);

        for i in 0..64usize {
          live.push(allocator.allocate(black_box(16 * (i % 7 + 1))));
        }

        for i in (0..live.len()).step_by(2) {
          allocator.deallocate(live[i]);
          live[i] = std::ptr::null_mut();
        }

        for i in (0..live.len()).step_by(2) {
          live[i] = allocator.allocate(black_box(24));
        }

        for p in live.drain(..) {
          allocator.deallocate(p);
        }
      },
      BatchSize::SmallInput,
    );
  });
}

criterion_group!(benches, round_trip, churn);
criterion_main!(benches);
