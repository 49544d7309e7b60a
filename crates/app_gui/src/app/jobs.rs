//! Worker threads for the blocking HTTP calls. Results come back over a
//! channel that the UI drains every frame.

use eframe::egui;
use flora_core::{Classifier, ClassifyError, HttpClassifier, PredictionList, Submission};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

pub(super) enum JobMessage {
    Classified {
        ticket: u64,
        outcome: Result<PredictionList, ClassifyError>,
    },
    ServiceChecked(Result<String, ClassifyError>),
}

pub(super) struct Jobs {
    message_tx: Sender<JobMessage>,
    message_rx: Receiver<JobMessage>,
}

impl Jobs {
    pub(super) fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel();
        Self {
            message_tx,
            message_rx,
        }
    }

    pub(super) fn try_recv_message(&self) -> Result<JobMessage, TryRecvError> {
        self.message_rx.try_recv()
    }

    pub(super) fn spawn_classify(
        &self,
        ctx: &egui::Context,
        classifier: Arc<HttpClassifier>,
        submission: Submission,
    ) {
        let tx = self.message_tx.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let outcome = classifier.classify(&submission.payload);
            let _ = tx.send(JobMessage::Classified {
                ticket: submission.ticket,
                outcome,
            });
            ctx.request_repaint();
        });
    }

    pub(super) fn spawn_service_check(&self, ctx: &egui::Context, classifier: Arc<HttpClassifier>) {
        let tx = self.message_tx.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let _ = tx.send(JobMessage::ServiceChecked(classifier.ping()));
            ctx.request_repaint();
        });
    }
}
