use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tcec_commentator_types::{ChessTag, MessageKind};

use crate::codec;
use crate::commentary::CommentaryGenerator;
use crate::commentator::Commentator;
use crate::speech::SpeechSink;

/// Receives every raw frame of one [`MessageKind`].
#[async_trait]
pub trait FrameHandler: Send {
    async fn handle(&mut self, frame: &str) -> Result<()>;
}

/// Result of routing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled(MessageKind),
    Unmatched(MessageKind),
}

/// Fixed routing table from message kind to handler, built once at startup.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<MessageKind, Box<dyn FrameHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, kind: MessageKind, handler: impl FrameHandler + 'static) -> Self {
        self.handlers.insert(kind, Box::new(handler));
        self
    }

    /// Classifies `frame` and hands it to the registered handler. Frames
    /// without a handler are logged and dropped; handler errors are
    /// returned untouched.
    pub async fn dispatch(&mut self, frame: &str) -> Result<Dispatch> {
        let kind = codec::classify(frame);
        match self.handlers.get_mut(&kind) {
            Some(handler) => {
                handler.handle(frame).await?;
                Ok(Dispatch::Handled(kind))
            }
            None => {
                tracing::warn!("No handler available for message_type: {}", kind);
                Ok(Dispatch::Unmatched(kind))
            }
        }
    }
}

/// Routes `pgn` and `liveeval` events into the commentator.
///
/// Malformed frames are dropped with a warning. Collaborator failures
/// surfaced by the commentator are returned to the dispatcher's caller.
pub struct ChessInformationHandler<G, S> {
    commentator: Commentator<G, S>,
}

impl<G: CommentaryGenerator, S: SpeechSink> ChessInformationHandler<G, S> {
    pub fn new(commentator: Commentator<G, S>) -> Self {
        Self { commentator }
    }

    pub fn commentator(&self) -> &Commentator<G, S> {
        &self.commentator
    }
}

#[async_trait]
impl<G: CommentaryGenerator, S: SpeechSink> FrameHandler for ChessInformationHandler<G, S> {
    async fn handle(&mut self, frame: &str) -> Result<()> {
        let info = match codec::parse_chess_information(frame) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("Dropping chess information frame: {}", e);
                return Ok(());
            }
        };

        match info.tag() {
            ChessTag::Pgn => match codec::extract_game_update(info.data()) {
                Ok(update) => {
                    let outcome = self.commentator.process_game_update(&update).await?;
                    tracing::debug!("Game update handled: {:?}", outcome);
                }
                Err(e) => tracing::warn!("Dropping pgn event: {}", e),
            },
            ChessTag::LiveEval => match codec::extract_eval_update(info.data()) {
                Ok(update) => {
                    let outcome = self.commentator.process_eval_update(&update).await?;
                    tracing::debug!("Eval update handled: {:?}", outcome);
                }
                Err(e) => tracing::warn!("Dropping liveeval event: {}", e),
            },
            ChessTag::Other(_) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commentary::MockCommentaryGenerator;
    use crate::speech::MockSpeechSink;
    use std::sync::{Arc, Mutex};

    const PGN_FRAME: &str = r#"42["pgn",{"Headers":{"White":"Alice","Black":"Bob"},"Moves":[{"m":"e4","fen":"rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"}]}]"#;
    const EVAL_FRAME: &str = r#"42["liveeval",{"engine":"Stockfish","eval":"0.2","pv":"e5"}]"#;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl FrameHandler for Recorder {
        async fn handle(&mut self, frame: &str) -> Result<()> {
            self.0.lock().unwrap().push(frame.to_string());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl FrameHandler for Failing {
        async fn handle(&mut self, _frame: &str) -> Result<()> {
            Err(anyhow::anyhow!("speech sink unavailable"))
        }
    }

    fn commentator_expecting(kinds: &'static [&'static str]) -> Commentator<MockCommentaryGenerator, MockSpeechSink> {
        let mut generator = MockCommentaryGenerator::new();
        generator
            .expect_generate()
            .withf(move |request| kinds.contains(&request.kind()))
            .times(kinds.len())
            .returning(|_| Ok("line".to_string()));
        let mut sink = MockSpeechSink::new();
        sink.expect_speak().times(kinds.len()).returning(|_| Ok(()));
        Commentator::new(generator, sink)
    }

    #[tokio::test]
    async fn test_unknown_frame_is_dropped() -> Result<()> {
        let recorder = Recorder::default();
        let mut dispatcher = Dispatcher::new().with_handler(MessageKind::ChessInformation, recorder.clone());

        let dispatch = dispatcher.dispatch(r#"99["noop"]"#).await?;

        assert_eq!(dispatch, Dispatch::Unmatched(MessageKind::Unknown));
        assert!(recorder.0.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_known_kind_without_handler_is_unmatched() -> Result<()> {
        let mut dispatcher = Dispatcher::new();
        assert_eq!(
            dispatcher.dispatch(r#"0{"sid":"x"}"#).await?,
            Dispatch::Unmatched(MessageKind::FirstPing)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_frames_reach_their_handler_in_order() -> Result<()> {
        let recorder = Recorder::default();
        let mut dispatcher = Dispatcher::new().with_handler(MessageKind::ChessInformation, recorder.clone());

        for frame in [PGN_FRAME, "40", EVAL_FRAME] {
            dispatcher.dispatch(frame).await?;
        }

        assert_eq!(*recorder.0.lock().unwrap(), vec![PGN_FRAME.to_string(), EVAL_FRAME.to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_handler_errors_propagate() {
        let mut dispatcher = Dispatcher::new().with_handler(MessageKind::ChessInformation, Failing);
        assert!(dispatcher.dispatch(PGN_FRAME).await.is_err());
    }

    #[tokio::test]
    async fn test_chess_information_routes_pgn_then_eval() -> Result<()> {
        let handler = ChessInformationHandler::new(commentator_expecting(&["startup", "eval"]));
        let mut dispatcher = Dispatcher::new().with_handler(MessageKind::ChessInformation, handler);

        assert_eq!(
            dispatcher.dispatch(PGN_FRAME).await?,
            Dispatch::Handled(MessageKind::ChessInformation)
        );
        dispatcher.dispatch(EVAL_FRAME).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_eval_before_any_game_is_silent() -> Result<()> {
        let mut handler = ChessInformationHandler::new(commentator_expecting(&[]));
        handler.handle(EVAL_FRAME).await?;
        assert!(!handler.commentator().context().startup_done());
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_and_foreign_events_are_swallowed() -> Result<()> {
        let mut handler = ChessInformationHandler::new(commentator_expecting(&[]));

        for frame in [
            r#"42["pgn""#,
            r#"42["pgn",{"Headers":{"White":"A"}}]"#,
            r#"42["liveeval",{"engine":"SF"}]"#,
            r#"42["users",{"count":1200}]"#,
            r#"42["banner","Game 12"]"#,
        ] {
            handler.handle(frame).await?;
        }
        assert!(handler.commentator().context().current_position().is_none());
        Ok(())
    }
}
