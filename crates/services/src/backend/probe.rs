use std::sync::{Mutex, PoisonError};

/// Ordered endpoint candidates with the winning candidate remembered.
///
/// The first candidate that answers with anything but 404 is kept and tried
/// first on later calls. A remembered candidate that starts answering 404 is
/// dropped again and the remaining candidates are probed in order.
#[derive(Debug)]
pub(crate) struct EndpointProbe {
    templates: Vec<String>,
    resolved: Mutex<Option<usize>>,
}

impl EndpointProbe {
    pub(crate) fn new(templates: Vec<String>) -> Self {
        Self {
            templates,
            resolved: Mutex::new(None),
        }
    }

    /// Candidate indices for one call, each appearing once.
    pub(crate) fn order(&self) -> Vec<usize> {
        let resolved = *self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        let mut order = Vec::with_capacity(self.templates.len());
        if let Some(idx) = resolved {
            order.push(idx);
        }
        order.extend((0..self.templates.len()).filter(|idx| Some(*idx) != resolved));
        order
    }

    pub(crate) fn template(&self, idx: usize) -> &str {
        &self.templates[idx]
    }

    pub(crate) fn remember(&self, idx: usize) {
        *self.resolved.lock().unwrap_or_else(PoisonError::into_inner) = Some(idx);
    }

    pub(crate) fn forget(&self, idx: usize) {
        let mut resolved = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        if *resolved == Some(idx) {
            *resolved = None;
        }
    }

    pub(crate) fn resolved_template(&self) -> Option<&str> {
        let resolved = *self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        resolved.map(|idx| self.templates[idx].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe() -> EndpointProbe {
        EndpointProbe::new(vec!["/a".into(), "/b".into(), "/c".into()])
    }

    #[test]
    fn unresolved_probe_tries_declared_order() {
        assert_eq!(probe().order(), vec![0, 1, 2]);
    }

    #[test]
    fn remembered_candidate_goes_first_once() {
        let p = probe();
        p.remember(2);
        assert_eq!(p.order(), vec![2, 0, 1]);
        assert_eq!(p.resolved_template(), Some("/c"));
    }

    #[test]
    fn forget_only_clears_matching_candidate() {
        let p = probe();
        p.remember(1);
        p.forget(0);
        assert_eq!(p.resolved_template(), Some("/b"));
        p.forget(1);
        assert_eq!(p.resolved_template(), None);
    }
}
