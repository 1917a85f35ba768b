use thiserror::Error;

use crate::align::{DSIZE, WSIZE};
use crate::block::Block;
use crate::explicit::ExplicitAllocator;
use crate::heap::GrowHeap;

/// One checker finding. Findings are advisory: the checker reports, it
/// never repairs or aborts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Corruption {
  #[error("payload at {address:#x} is not 8-byte aligned")]
  MisalignedPayload { address: usize },
  #[error("header and footer disagree on block at {address:#x}")]
  TagMismatch { address: usize },
  #[error("prologue sentinel is malformed")]
  BadPrologue,
  #[error("epilogue sentinel is malformed or missing")]
  BadEpilogue,
  #[error("physically adjacent free blocks at {address:#x}")]
  AdjacentFree { address: usize },
  #[error("free-list link at {address:#x} does not resolve inside the heap")]
  BrokenLink { address: usize },
  #[error("free-list links around {address:#x} are not mutually consistent")]
  InconsistentLink { address: usize },
  #[error("allocated block at {address:#x} sits on the free list")]
  AllocatedInList { address: usize },
  #[error("block scan found {scanned} free blocks but the list holds {listed}")]
  CountMismatch { scanned: usize, listed: usize },
}

/// Result of a consistency scan: block census plus every finding.
#[derive(Debug, Default)]
pub struct CheckReport {
  /// Blocks between the sentinels, allocated and free.
  pub blocks: usize,
  /// Free blocks seen by the physical scan.
  pub free_blocks: usize,
  /// Nodes reached by walking the free list.
  pub list_nodes: usize,
  pub issues: Vec<Corruption>,
}

impl CheckReport {
  pub fn is_clean(&self) -> bool {
    self.issues.is_empty()
  }

  fn report(&mut self, issue: Corruption) {
    log::warn!("heap check: {issue}");
    self.issues.push(issue);
  }
}

impl<G: GrowHeap> ExplicitAllocator<G> {
  /// Scans the whole heap and the free list for structural damage and
  /// returns what it found. Non-fatal and read-only; safe to run at any
  /// point between operations. With `verbose` every block is logged at
  /// `trace` level.
  pub fn check(&self, verbose: bool) -> CheckReport {
    let mut report = CheckReport::default();

    if verbose {
      log::trace!(
        "heap [{:p}, {:p}), {} bytes",
        self.region.base(),
        self.region.limit(),
        self.region.len()
      );
    }

    unsafe {
      self.check_blocks(&mut report, verbose);
      self.check_list(&mut report);
    }

    log::debug!(
      "heap check: {} blocks, {} free, {} listed, {} issue(s)",
      report.blocks,
      report.free_blocks,
      report.list_nodes,
      report.issues.len()
    );
    report
  }

  unsafe fn check_blocks(&self, report: &mut CheckReport, verbose: bool) {
    unsafe {
      let prologue = Block::from_payload_unchecked(self.first_block);
      if prologue.size() != DSIZE || !prologue.is_allocated() {
        report.report(Corruption::BadPrologue);
        return;
      }
      if prologue.header() != prologue.footer() {
        report.report(Corruption::BadPrologue);
      }

      // A free run only counts as corruption when neither side is pinned;
      // a pinned block legitimately defers its merge.
      let mut prev_was_mergeable_free = false;
      let mut cursor = prologue.next();

      loop {
        let header_address = cursor.header_ptr() as usize;
        let limit = self.region.limit() as usize;

        // Running off the extent means the epilogue never showed up.
        if header_address + WSIZE > limit {
          report.report(Corruption::BadEpilogue);
          return;
        }

        let header = cursor.header();
        if verbose {
          log::trace!("{:p}: {:?}", cursor.payload(), header);
        }

        if header.size() == 0 {
          // Epilogue: allocated, zero-sized, flush with the heap end.
          if !header.is_allocated() || header_address + WSIZE != limit {
            report.report(Corruption::BadEpilogue);
          }
          return;
        }

        report.blocks += 1;
        let address = cursor.payload() as usize;

        if address % DSIZE != 0 {
          report.report(Corruption::MisalignedPayload { address });
          // Block sizes are untrustworthy past a misaligned payload.
          return;
        }
        if header != cursor.footer() {
          report.report(Corruption::TagMismatch { address });
        }

        let free = !header.is_allocated();
        if free {
          report.free_blocks += 1;
        }
        let mergeable_free = free && !header.is_pinned();
        if mergeable_free && prev_was_mergeable_free {
          report.report(Corruption::AdjacentFree { address });
        }
        prev_was_mergeable_free = mergeable_free;

        cursor = cursor.next();
      }
    }
  }

  unsafe fn check_list(&self, report: &mut CheckReport) {
    unsafe {
      let Some(head) = self.list.head(&self.region) else {
        if !self.list.is_empty() {
          // Root cell holds an offset that resolves outside the heap.
          report.report(Corruption::BrokenLink {
            address: self.list.root() as usize,
          });
        }
        if report.free_blocks != 0 && self.list.is_empty() {
          report.report(Corruption::CountMismatch {
            scanned: report.free_blocks,
            listed: 0,
          });
        }
        return;
      };

      // The head's prev must name the root cell.
      match self.list.prev_target(head, &self.region) {
        Some(target) if target == self.list.root() => {}
        Some(_) | None => report.report(Corruption::InconsistentLink {
          address: head.payload() as usize,
        }),
      }

      let mut previous: Option<Block> = None;
      for node in self.list.iter(&self.region) {
        report.list_nodes += 1;
        let address = node.payload() as usize;

        if node.is_allocated() {
          report.report(Corruption::AllocatedInList { address });
          continue;
        }

        // Interior nodes must point back at the node we came from.
        if let Some(prev_node) = previous {
          match self.list.prev_target(node, &self.region) {
            Some(target) if target == prev_node.payload() => {}
            Some(_) => report.report(Corruption::InconsistentLink { address }),
            None => report.report(Corruption::BrokenLink { address }),
          }
        }
        previous = Some(node);
      }

      if report.list_nodes != report.free_blocks {
        report.report(Corruption::CountMismatch {
          scanned: report.free_blocks,
          listed: report.list_nodes,
        });
      }
    }
  }
}
