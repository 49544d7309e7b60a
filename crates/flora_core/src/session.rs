//! Selection and submission lifecycle of a single identification session.
//!
//! A [`Session`] owns at most one picked image and its preview handle. The
//! submission lifecycle is the tagged [`SubmissionState`]; every variant other
//! than `Idle` carries the image, so a submission without an image cannot be
//! expressed.

use crate::client::{Classifier, ClassifyError};
use crate::{ImagePayload, PredictionList};
use std::mem;

/// Derives and releases the revocable preview shown for a not yet uploaded image.
pub trait PreviewFactory {
    type Handle;

    fn create(&mut self, image: &ImagePayload) -> Self::Handle;

    fn release(&mut self, handle: Self::Handle);
}

/// The picked image together with its preview handle.
#[derive(Debug)]
pub struct SelectedImage<H> {
    pub payload: ImagePayload,
    pub preview: H,
}

#[derive(Debug)]
pub enum SubmissionState<H> {
    Idle,
    Ready {
        image: SelectedImage<H>,
    },
    InFlight {
        image: SelectedImage<H>,
        ticket: u64,
    },
    Succeeded {
        image: SelectedImage<H>,
        predictions: PredictionList,
    },
    Failed {
        image: SelectedImage<H>,
        message: String,
    },
}

/// Tag of a [`SubmissionState`] without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionPhase {
    Idle,
    Ready,
    InFlight,
    Succeeded,
    Failed,
}

impl<H> Default for SubmissionState<H> {
    fn default() -> Self {
        SubmissionState::Idle
    }
}

impl<H> SubmissionState<H> {
    pub fn phase(&self) -> SubmissionPhase {
        match self {
            SubmissionState::Idle => SubmissionPhase::Idle,
            SubmissionState::Ready { .. } => SubmissionPhase::Ready,
            SubmissionState::InFlight { .. } => SubmissionPhase::InFlight,
            SubmissionState::Succeeded { .. } => SubmissionPhase::Succeeded,
            SubmissionState::Failed { .. } => SubmissionPhase::Failed,
        }
    }

    pub fn image(&self) -> Option<&SelectedImage<H>> {
        match self {
            SubmissionState::Idle => None,
            SubmissionState::Ready { image }
            | SubmissionState::InFlight { image, .. }
            | SubmissionState::Succeeded { image, .. }
            | SubmissionState::Failed { image, .. } => Some(image),
        }
    }

    fn into_image(self) -> Option<SelectedImage<H>> {
        match self {
            SubmissionState::Idle => None,
            SubmissionState::Ready { image }
            | SubmissionState::InFlight { image, .. }
            | SubmissionState::Succeeded { image, .. }
            | SubmissionState::Failed { image, .. } => Some(image),
        }
    }
}

/// A dispatched request: the payload to upload and the ticket its outcome must echo.
#[derive(Debug, Clone)]
pub struct Submission {
    pub ticket: u64,
    pub payload: ImagePayload,
}

pub struct Session<F: PreviewFactory> {
    previews: F,
    state: SubmissionState<F::Handle>,
    next_ticket: u64,
}

impl<F: PreviewFactory> Session<F> {
    pub fn new(previews: F) -> Self {
        Self {
            previews,
            state: SubmissionState::Idle,
            next_ticket: 1,
        }
    }

    pub fn state(&self) -> &SubmissionState<F::Handle> {
        &self.state
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.state.phase()
    }

    pub fn selected(&self) -> Option<&ImagePayload> {
        self.state.image().map(|image| &image.payload)
    }

    pub fn preview(&self) -> Option<&F::Handle> {
        self.state.image().map(|image| &image.preview)
    }

    pub fn predictions(&self) -> Option<&PredictionList> {
        match &self.state {
            SubmissionState::Succeeded { predictions, .. } => Some(predictions),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            SubmissionState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn previews(&self) -> &F {
        &self.previews
    }

    /// Whether [`Session::begin_identify`] would dispatch a request right now.
    pub fn can_identify(&self) -> bool {
        matches!(
            self.state,
            SubmissionState::Ready { .. } | SubmissionState::Failed { .. }
        )
    }

    /// Replace the current image. The old preview is released before the new
    /// one is derived, and any result or error is discarded.
    pub fn select_image(&mut self, payload: ImagePayload) {
        let previous = mem::take(&mut self.state);
        if let SubmissionState::InFlight { ticket, .. } = &previous {
            tracing::debug!("selection replaced while submission {ticket} in flight");
        }
        if let Some(old) = previous.into_image() {
            self.previews.release(old.preview);
        }
        tracing::info!(
            "selected image {} ({} bytes)",
            payload.file_name,
            payload.len()
        );
        let preview = self.previews.create(&payload);
        self.state = SubmissionState::Ready {
            image: SelectedImage { payload, preview },
        };
    }

    /// Drop the current image and its preview. Returns false when nothing was selected.
    pub fn clear_image(&mut self) -> bool {
        match mem::take(&mut self.state).into_image() {
            Some(old) => {
                tracing::info!("cleared image {}", old.payload.file_name);
                self.previews.release(old.preview);
                true
            }
            None => false,
        }
    }

    /// Move to `InFlight` and hand out the request to send. `None` (and no state
    /// change) unless an image is selected and no submission is in flight.
    pub fn begin_identify(&mut self) -> Option<Submission> {
        if !self.can_identify() {
            tracing::debug!("identify ignored in phase {:?}", self.phase());
            return None;
        }
        let image = mem::take(&mut self.state).into_image()?;
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let submission = Submission {
            ticket,
            payload: image.payload.clone(),
        };
        tracing::info!(
            "submitting {} as request {ticket}",
            submission.payload.file_name
        );
        self.state = SubmissionState::InFlight { image, ticket };
        Some(submission)
    }

    /// Apply the outcome of request `ticket`. Outcomes of superseded requests are
    /// dropped; returns whether the outcome was applied.
    pub fn finish_identify(
        &mut self,
        ticket: u64,
        outcome: Result<PredictionList, ClassifyError>,
    ) -> bool {
        let current = match &self.state {
            SubmissionState::InFlight { ticket: t, .. } => Some(*t),
            _ => None,
        };
        if current != Some(ticket) {
            tracing::debug!("discarding outcome of superseded request {ticket}");
            return false;
        }
        let Some(image) = mem::take(&mut self.state).into_image() else {
            return false;
        };
        self.state = match outcome {
            Ok(predictions) => {
                tracing::info!(
                    "request {ticket} returned {} predictions",
                    predictions.len()
                );
                SubmissionState::Succeeded { image, predictions }
            }
            Err(err) => {
                tracing::warn!("request {ticket} failed: {err}");
                SubmissionState::Failed {
                    image,
                    message: err.user_message(),
                }
            }
        };
        true
    }

    /// Dispatch and resolve a submission on the calling thread.
    pub fn identify<C: Classifier + ?Sized>(&mut self, classifier: &C) -> bool {
        let Some(submission) = self.begin_identify() else {
            return false;
        };
        let outcome = classifier.classify(&submission.payload);
        self.finish_identify(submission.ticket, outcome)
    }
}

impl<F: PreviewFactory> Drop for Session<F> {
    fn drop(&mut self) {
        if let Some(image) = mem::take(&mut self.state).into_image() {
            self.previews.release(image.preview);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::GENERIC_FAILURE_MESSAGE;
    use crate::Prediction;
    use reqwest::StatusCode;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;
    use std::rc::Rc;

    /// Tracks which preview ids are alive so leaks and double releases show up.
    #[derive(Default, Clone)]
    pub(crate) struct CountingPreviews {
        next: u32,
        pub(crate) live: Rc<RefCell<HashSet<u32>>>,
        pub(crate) released: Rc<RefCell<Vec<u32>>>,
    }

    impl PreviewFactory for CountingPreviews {
        type Handle = u32;

        fn create(&mut self, _image: &ImagePayload) -> u32 {
            self.next += 1;
            self.live.borrow_mut().insert(self.next);
            self.next
        }

        fn release(&mut self, handle: u32) {
            assert!(self.live.borrow_mut().remove(&handle), "double release");
            self.released.borrow_mut().push(handle);
        }
    }

    /// Classifier returning a canned outcome and counting calls.
    pub(crate) struct StubClassifier {
        pub(crate) outcome: fn() -> Result<PredictionList, ClassifyError>,
        pub(crate) calls: Cell<usize>,
    }

    impl StubClassifier {
        pub(crate) fn new(outcome: fn() -> Result<PredictionList, ClassifyError>) -> Self {
            Self {
                outcome,
                calls: Cell::new(0),
            }
        }
    }

    impl Classifier for StubClassifier {
        fn classify(&self, _image: &ImagePayload) -> Result<PredictionList, ClassifyError> {
            self.calls.set(self.calls.get() + 1);
            (self.outcome)()
        }
    }

    pub(crate) fn rose_and_tulip() -> Result<PredictionList, ClassifyError> {
        Ok(vec![
            Prediction {
                species: "Rose".into(),
                confidence: 97.2,
            },
            Prediction {
                species: "Tulip".into(),
                confidence: 2.1,
            },
        ])
    }

    pub(crate) fn invalid_image() -> Result<PredictionList, ClassifyError> {
        Err(ClassifyError::Service("invalid image".into()))
    }

    fn image(name: &str) -> ImagePayload {
        ImagePayload::new(name, vec![0xFFu8, 0xD8, 0xFF])
    }

    fn session() -> (Session<CountingPreviews>, CountingPreviews) {
        let previews = CountingPreviews::default();
        (Session::new(previews.clone()), previews)
    }

    #[test]
    fn new_session_is_idle() {
        let (session, _) = session();
        assert_eq!(session.phase(), SubmissionPhase::Idle);
        assert!(session.selected().is_none());
        assert!(session.preview().is_none());
        assert!(!session.can_identify());
    }

    #[test]
    fn selecting_replaces_preview_and_keeps_exactly_one_alive() {
        let (mut session, previews) = session();
        session.select_image(image("a.jpg"));
        let first = *session.preview().unwrap();
        session.select_image(image("b.jpg"));

        assert_eq!(previews.released.borrow().as_slice(), &[first]);
        assert_eq!(previews.live.borrow().len(), 1);
        assert_eq!(session.selected().unwrap().file_name, "b.jpg");
        assert_eq!(session.phase(), SubmissionPhase::Ready);
    }

    #[test]
    fn clear_without_image_is_noop() {
        let (mut session, previews) = session();
        assert!(!session.clear_image());
        assert!(!session.clear_image());
        assert_eq!(session.phase(), SubmissionPhase::Idle);
        assert!(previews.released.borrow().is_empty());
    }

    #[test]
    fn clear_releases_preview_and_goes_idle() {
        let (mut session, previews) = session();
        session.select_image(image("a.jpg"));
        assert!(session.clear_image());
        assert_eq!(session.phase(), SubmissionPhase::Idle);
        assert!(previews.live.borrow().is_empty());
    }

    #[test]
    fn identify_without_image_does_nothing() {
        let (mut session, _) = session();
        let classifier = StubClassifier::new(rose_and_tulip);
        assert!(session.begin_identify().is_none());
        assert!(!session.identify(&classifier));
        assert_eq!(classifier.calls.get(), 0);
        assert_eq!(session.phase(), SubmissionPhase::Idle);
    }

    #[test]
    fn identify_while_in_flight_is_noop() {
        let (mut session, _) = session();
        session.select_image(image("a.jpg"));
        let first = session.begin_identify().unwrap();
        assert_eq!(session.phase(), SubmissionPhase::InFlight);
        assert!(session.begin_identify().is_none());

        let classifier = StubClassifier::new(rose_and_tulip);
        assert!(!session.identify(&classifier));
        assert_eq!(classifier.calls.get(), 0);
        match session.state() {
            SubmissionState::InFlight { ticket, .. } => assert_eq!(*ticket, first.ticket),
            other => panic!("unexpected state {:?}", other.phase()),
        }
    }

    #[test]
    fn submission_carries_selected_payload() {
        let (mut session, _) = session();
        session.select_image(image("a.jpg"));
        let submission = session.begin_identify().unwrap();
        assert_eq!(submission.payload.file_name, "a.jpg");
        assert_eq!(&submission.payload.bytes[..], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn success_stores_predictions_in_received_order() {
        let (mut session, _) = session();
        session.select_image(image("rose.jpg"));
        let classifier = StubClassifier::new(rose_and_tulip);
        assert!(session.identify(&classifier));

        assert_eq!(session.phase(), SubmissionPhase::Succeeded);
        let predictions = session.predictions().unwrap();
        assert_eq!(predictions[0].species, "Rose");
        assert_eq!(predictions[1].species, "Tulip");
        assert!(session.error_message().is_none());
    }

    #[test]
    fn service_error_is_surfaced_verbatim() {
        let (mut session, _) = session();
        session.select_image(image("rose.jpg"));
        session.identify(&StubClassifier::new(invalid_image));
        assert_eq!(session.phase(), SubmissionPhase::Failed);
        assert_eq!(session.error_message(), Some("invalid image"));
        assert!(session.predictions().is_none());
        assert!(session.preview().is_some());
    }

    #[test]
    fn transport_failure_uses_generic_message_and_ends_in_flight() {
        let (mut session, _) = session();
        session.select_image(image("rose.jpg"));
        session.identify(&StubClassifier::new(|| {
            Err(ClassifyError::Status(StatusCode::BAD_GATEWAY))
        }));
        assert_eq!(session.phase(), SubmissionPhase::Failed);
        assert_eq!(session.error_message(), Some(GENERIC_FAILURE_MESSAGE));
        assert!(session.can_identify());
    }

    #[test]
    fn failed_submission_can_be_retried() {
        let (mut session, _) = session();
        session.select_image(image("rose.jpg"));
        session.identify(&StubClassifier::new(invalid_image));
        let classifier = StubClassifier::new(rose_and_tulip);
        assert!(session.identify(&classifier));
        assert_eq!(classifier.calls.get(), 1);
        assert_eq!(session.phase(), SubmissionPhase::Succeeded);
    }

    #[test]
    fn succeeded_session_does_not_resubmit() {
        let (mut session, _) = session();
        session.select_image(image("rose.jpg"));
        session.identify(&StubClassifier::new(rose_and_tulip));
        assert!(session.begin_identify().is_none());
        assert_eq!(session.phase(), SubmissionPhase::Succeeded);
    }

    #[test]
    fn reselect_after_result_discards_it() {
        let (mut session, _) = session();
        session.select_image(image("rose.jpg"));
        session.identify(&StubClassifier::new(rose_and_tulip));
        session.select_image(image("tulip.jpg"));
        assert_eq!(session.phase(), SubmissionPhase::Ready);
        assert!(session.predictions().is_none());

        session.identify(&StubClassifier::new(invalid_image));
        session.select_image(image("lily.jpg"));
        assert_eq!(session.phase(), SubmissionPhase::Ready);
        assert!(session.error_message().is_none());
    }

    #[test]
    fn clear_after_failure_discards_message() {
        let (mut session, previews) = session();
        session.select_image(image("rose.jpg"));
        session.identify(&StubClassifier::new(invalid_image));
        assert!(session.clear_image());
        assert_eq!(session.phase(), SubmissionPhase::Idle);
        assert!(session.error_message().is_none());
        assert!(previews.live.borrow().is_empty());
    }

    #[test]
    fn clear_after_success_discards_predictions() {
        let (mut session, previews) = session();
        session.select_image(image("rose.jpg"));
        session.identify(&StubClassifier::new(rose_and_tulip));
        assert_eq!(session.phase(), SubmissionPhase::Succeeded);
        assert!(session.clear_image());
        assert_eq!(session.phase(), SubmissionPhase::Idle);
        assert!(session.predictions().is_none());
        assert!(previews.live.borrow().is_empty());
    }

    #[test]
    fn outcome_of_superseded_request_is_discarded() {
        let (mut session, _) = session();
        session.select_image(image("a.jpg"));
        let stale = session.begin_identify().unwrap();
        session.select_image(image("b.jpg"));

        assert!(!session.finish_identify(stale.ticket, rose_and_tulip()));
        assert_eq!(session.phase(), SubmissionPhase::Ready);

        let fresh = session.begin_identify().unwrap();
        assert_ne!(fresh.ticket, stale.ticket);
        assert!(session.finish_identify(fresh.ticket, rose_and_tulip()));
        assert_eq!(session.phase(), SubmissionPhase::Succeeded);
    }

    #[test]
    fn outcome_after_clear_is_discarded() {
        let (mut session, _) = session();
        session.select_image(image("a.jpg"));
        let submission = session.begin_identify().unwrap();
        session.clear_image();
        assert!(!session.finish_identify(submission.ticket, rose_and_tulip()));
        assert_eq!(session.phase(), SubmissionPhase::Idle);
    }

    #[test]
    fn dropping_session_releases_preview() {
        let (mut session, previews) = session();
        session.select_image(image("a.jpg"));
        assert_eq!(previews.live.borrow().len(), 1);
        drop(session);
        assert!(previews.live.borrow().is_empty());
    }
}
