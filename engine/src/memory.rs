//! Shared memory budget for the engine's internal tables.
//!
//! The budget is negotiated before the engine is brought up: reservation is
//! attempted at a platform ceiling and shrunk on exhaustion until it fits or
//! the fixed minimum itself fails.

/// Size of one budget page in bytes.
pub const PAGE_SIZE: usize = 64 * 1024;

/// Smallest budget the engine can run with.
pub const MIN_PAGES: u32 = 2048;

/// Ceiling on hosts with a full address space.
pub const MAX_PAGES: u32 = 32767;

/// Ceiling on memory-constrained targets.
pub const CONSTRAINED_MAX_PAGES: u32 = 16384;

/// Platform ceiling for the reservation.
pub fn max_pages() -> u32 {
    if cfg!(any(
        target_pointer_width = "32",
        target_os = "android",
        target_os = "ios"
    )) {
        CONSTRAINED_MAX_PAGES
    } else {
        MAX_PAGES
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReserveError {
    #[error("resource exhausted reserving {pages} pages")]
    ResourceExhausted { pages: u32 },
    #[error("memory reservation failed: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    pub pages: u32,
}

impl MemoryBudget {
    pub fn bytes(&self) -> u64 {
        self.pages as u64 * PAGE_SIZE as u64
    }

    pub fn megabytes(&self) -> u32 {
        (self.bytes() / (1024 * 1024)) as u32
    }
}

/// Something that can reserve a memory region of a given page count.
pub trait MemoryReserver: Send + Sync {
    fn reserve(&self, pages: u32) -> Result<MemoryBudget, ReserveError>;
}

/// Probes the allocator for the requested size and releases the probe
/// immediately. Allocation failure counts as exhaustion; a size the address
/// space cannot express does not.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapProbe;

impl MemoryReserver for HeapProbe {
    fn reserve(&self, pages: u32) -> Result<MemoryBudget, ReserveError> {
        let bytes = (pages as usize)
            .checked_mul(PAGE_SIZE)
            .filter(|b| *b <= isize::MAX as usize)
            .ok_or_else(|| ReserveError::Other(format!("{} pages overflow the address space", pages)))?;

        let mut probe: Vec<u8> = Vec::new();
        probe
            .try_reserve_exact(bytes)
            .map_err(|_| ReserveError::ResourceExhausted { pages })?;
        Ok(MemoryBudget { pages })
    }
}

/// Next attempt after an exhaustion failure: `ceil(pages - pages / divisor)`.
/// Divisors below 2 are treated as 2.
fn shrink(pages: u32, divisor: u32) -> u32 {
    let pages = pages as u64;
    let divisor = divisor.max(2) as u64;
    ((pages * (divisor - 1) + divisor - 1) / divisor) as u32
}

/// Reserve the largest budget in `[min_pages, max_pages]` the reserver accepts.
///
/// Starts at the ceiling and, on `ResourceExhausted` only, shrinks by a
/// quarter then a third, alternating, never going below the minimum. Any other
/// error, or exhaustion at the minimum, is returned as is.
#[tracing::instrument(level = "debug", skip(reserver))]
pub fn reserve_adaptive(
    reserver: &dyn MemoryReserver,
    min_pages: u32,
    max_pages: u32,
) -> Result<MemoryBudget, ReserveError> {
    let mut pages = max_pages.max(min_pages);
    let mut divisors = [4u32, 3].into_iter().cycle();

    loop {
        match reserver.reserve(pages) {
            Ok(budget) => {
                tracing::info!(pages = budget.pages, mb = budget.megabytes(), "Reserved engine memory");
                return Ok(budget);
            }
            Err(ReserveError::ResourceExhausted { .. }) if pages > min_pages => {
                let divisor = divisors.next().unwrap_or(4);
                let next = shrink(pages, divisor).max(min_pages);
                tracing::warn!(pages, next, "Memory reservation exhausted, retrying smaller");
                pages = next;
            }
            Err(e) => {
                tracing::error!(pages, "Memory reservation failed: {}", e);
                return Err(e);
            }
        }
    }
}
