//! Decides, from a noisy stream of game and evaluation updates, when a new
//! line of commentary should be spoken.

use anyhow::{Context, Result};
use std::time::Duration;
use tcec_commentator_types::{EvalUpdate, GameUpdate};
use tokio::time::Instant;

use crate::commentary::{CommentaryGenerator, CommentaryRequest};
use crate::position::{BoardState, MoveCheck};
use crate::speech::SpeechSink;

/// Minimum time between two spoken evaluation updates.
pub const EVALUATION_COMMENTARY_COOLDOWN: Duration = Duration::from_secs(10 * 60);

/// What a game update led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionOutcome {
    Startup,
    Duplicate,
    Move,
    NewGame,
    /// The FEN could not be parsed; nothing changed.
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalOutcome {
    Spoken,
    Suppressed,
}

/// State owned by the commentator for one session. It survives reconnects.
#[derive(Debug, Default)]
pub struct CommentaryContext {
    current_position: Option<BoardState>,
    last_spoken_eval_at: Option<Instant>,
    startup_done: bool,
}

impl CommentaryContext {
    pub fn current_position(&self) -> Option<&BoardState> {
        self.current_position.as_ref()
    }

    pub fn last_spoken_eval_at(&self) -> Option<Instant> {
        self.last_spoken_eval_at
    }

    pub fn startup_done(&self) -> bool {
        self.startup_done
    }
}

pub struct Commentator<G, S> {
    generator: G,
    sink: S,
    context: CommentaryContext,
    eval_cooldown: Duration,
}

impl<G: CommentaryGenerator, S: SpeechSink> Commentator<G, S> {
    pub fn new(generator: G, sink: S) -> Self {
        Self {
            generator,
            sink,
            context: CommentaryContext::default(),
            eval_cooldown: EVALUATION_COMMENTARY_COOLDOWN,
        }
    }

    pub fn with_eval_cooldown(mut self, cooldown: Duration) -> Self {
        self.eval_cooldown = cooldown;
        self
    }

    pub fn context(&self) -> &CommentaryContext {
        &self.context
    }

    /// Handles the latest move of the broadcast game.
    ///
    /// Bookkeeping is committed before the collaborators are called, so a
    /// failed generation or playback still leaves the context consistent
    /// with the feed. Such failures are returned to the caller.
    pub async fn process_game_update(&mut self, update: &GameUpdate) -> Result<PositionOutcome> {
        let received = match BoardState::from_fen(update.fen_position()) {
            Ok(received) => received,
            Err(e) => {
                tracing::warn!("Dropping game update: {}", e);
                return Ok(PositionOutcome::Dropped);
            }
        };

        let (outcome, request) = match self.context.current_position.as_ref() {
            None => (
                PositionOutcome::Startup,
                CommentaryRequest::Startup {
                    fen_position: update.fen_position().to_string(),
                    last_move: update.last_move_san().to_string(),
                    white_name: update.white_name().to_string(),
                    black_name: update.black_name().to_string(),
                },
            ),
            Some(current) if *current == received => return Ok(PositionOutcome::Duplicate),
            Some(current) => match current.check_move(update.last_move_san()) {
                MoveCheck::Legal(_) => (
                    PositionOutcome::Move,
                    CommentaryRequest::Move {
                        fen_position: update.fen_position().to_string(),
                        last_move: update.last_move_san().to_string(),
                    },
                ),
                MoveCheck::Illegal => {
                    tracing::info!(
                        "Move {:?} is not legal from {}, treating as a new game",
                        update.last_move_san(),
                        current.fen()
                    );
                    (
                        PositionOutcome::NewGame,
                        CommentaryRequest::NewGame {
                            fen_position: update.fen_position().to_string(),
                            white_name: update.white_name().to_string(),
                            black_name: update.black_name().to_string(),
                        },
                    )
                }
            },
        };

        self.context.current_position = Some(received);
        if outcome == PositionOutcome::Startup {
            self.context.startup_done = true;
        }

        self.speak(&request).await?;
        Ok(outcome)
    }

    /// Handles an engine evaluation. Only spoken after startup and at most
    /// once per cooldown period; everything else is dropped silently.
    pub async fn process_eval_update(&mut self, update: &EvalUpdate) -> Result<EvalOutcome> {
        let now = Instant::now();
        let cooled_down = self
            .context
            .last_spoken_eval_at
            .map_or(true, |last| now.duration_since(last) > self.eval_cooldown);
        if !self.context.startup_done || !cooled_down {
            return Ok(EvalOutcome::Suppressed);
        }

        self.context.last_spoken_eval_at = Some(now);
        let request = CommentaryRequest::Eval {
            engine_name: update.engine_name().to_string(),
            evaluation: update.evaluation().to_string(),
            best_line: update.best_line().to_string(),
        };
        self.speak(&request).await?;
        Ok(EvalOutcome::Spoken)
    }

    async fn speak(&mut self, request: &CommentaryRequest) -> Result<()> {
        let text = self
            .generator
            .generate(request)
            .await
            .with_context(|| format!("Failed to generate {} commentary", request.kind()))?;
        self.sink
            .speak(&text)
            .await
            .with_context(|| format!("Failed to vocalize {} commentary", request.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commentary::MockCommentaryGenerator;
    use crate::speech::MockSpeechSink;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
    const UNRELATED: &str = "8/5k2/8/8/8/8/2K5/8 w - - 40 90";

    fn game(fen: &str, san: &str) -> GameUpdate {
        GameUpdate::new(fen, san, "Alice", "Bob")
    }

    fn eval() -> EvalUpdate {
        EvalUpdate::new("Stockfish", "+0.31", "e5 Nf3 Nc6")
    }

    /// A generator that expects `kinds` in order and a sink that accepts them.
    fn expecting(kinds: &[&'static str]) -> Commentator<MockCommentaryGenerator, MockSpeechSink> {
        let mut generator = MockCommentaryGenerator::new();
        let mut seq = mockall::Sequence::new();
        for kind in kinds {
            let kind = *kind;
            generator
                .expect_generate()
                .withf(move |request| request.kind() == kind)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|request| Ok(format!("{} commentary", request.kind())));
        }
        let mut sink = MockSpeechSink::new();
        sink.expect_speak().times(kinds.len()).returning(|_| Ok(()));
        Commentator::new(generator, sink)
    }

    #[tokio::test]
    async fn test_first_update_is_startup() -> Result<()> {
        let mut commentator = expecting(&["startup"]);

        let outcome = commentator.process_game_update(&game(START, "e4")).await?;

        assert_eq!(outcome, PositionOutcome::Startup);
        assert!(commentator.context().startup_done());
        assert_eq!(
            commentator.context().current_position(),
            Some(&BoardState::from_fen(START)?)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_startup_request_carries_names_and_move() -> Result<()> {
        let mut generator = MockCommentaryGenerator::new();
        generator
            .expect_generate()
            .withf(|request| {
                *request
                    == CommentaryRequest::Startup {
                        fen_position: START.to_string(),
                        last_move: "e4".to_string(),
                        white_name: "Alice".to_string(),
                        black_name: "Bob".to_string(),
                    }
            })
            .times(1)
            .returning(|_| Ok("Welcome to the broadcast".to_string()));
        let mut sink = MockSpeechSink::new();
        sink.expect_speak()
            .withf(|text| text == "Welcome to the broadcast")
            .times(1)
            .returning(|_| Ok(()));

        let mut commentator = Commentator::new(generator, sink);
        commentator.process_game_update(&game(START, "e4")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_position_is_spoken_once() -> Result<()> {
        let mut commentator = expecting(&["startup"]);

        commentator.process_game_update(&game(START, "e4")).await?;
        let outcome = commentator.process_game_update(&game(START, "e4")).await?;

        assert_eq!(outcome, PositionOutcome::Duplicate);
        Ok(())
    }

    #[tokio::test]
    async fn test_en_passant_notation_does_not_split_duplicates() -> Result<()> {
        let mut commentator = expecting(&["startup"]);
        let with_square = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";

        commentator.process_game_update(&game(with_square, "e4")).await?;
        let outcome = commentator.process_game_update(&game(AFTER_E4, "e4")).await?;

        assert_eq!(outcome, PositionOutcome::Duplicate);
        Ok(())
    }

    #[tokio::test]
    async fn test_legal_move_is_move_commentary() -> Result<()> {
        let mut commentator = expecting(&["startup", "move"]);

        commentator.process_game_update(&game(START, "e4")).await?;
        let outcome = commentator.process_game_update(&game(AFTER_E4, "e4")).await?;

        assert_eq!(outcome, PositionOutcome::Move);
        assert_eq!(
            commentator.context().current_position().map(BoardState::fen),
            Some(BoardState::from_fen(AFTER_E4)?.fen())
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_position_is_new_game() -> Result<()> {
        let mut commentator = expecting(&["startup", "new game"]);

        commentator.process_game_update(&game(START, "e4")).await?;
        let outcome = commentator.process_game_update(&game(UNRELATED, "Kc2")).await?;

        assert_eq!(outcome, PositionOutcome::NewGame);
        assert_eq!(
            commentator.context().current_position(),
            Some(&BoardState::from_fen(UNRELATED)?)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_illegal_or_garbled_san_is_new_game() -> Result<()> {
        for san in ["Nf6", "", "??", "e4e5", "Qxh9"] {
            let mut commentator = expecting(&["startup", "new game"]);
            commentator.process_game_update(&game(START, "e4")).await?;
            let outcome = commentator.process_game_update(&game(AFTER_E4, san)).await?;
            assert_eq!(outcome, PositionOutcome::NewGame, "san {san:?}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_every_legal_opening_move_is_move_commentary() -> Result<()> {
        let start = BoardState::from_fen(START)?;
        let mut moves = Vec::new();
        start.board().generate_moves(|piece_moves| {
            moves.extend(piece_moves);
            false
        });
        assert_eq!(moves.len(), 20);

        for mv in moves {
            let mut board = start.board().clone();
            board.play(mv);
            let piece = start.board().piece_on(mv.from);
            let san = match piece {
                Some(cozy_chess::Piece::Knight) => format!("N{}", mv.to),
                _ => mv.to.to_string(),
            };

            let mut commentator = expecting(&["startup", "move"]);
            commentator.process_game_update(&game(START, "")).await?;
            let outcome = commentator
                .process_game_update(&game(&board.to_string(), &san))
                .await?;
            assert_eq!(outcome, PositionOutcome::Move, "san {san}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_fen_is_dropped() -> Result<()> {
        let mut commentator = expecting(&["startup"]);

        assert_eq!(
            commentator.process_game_update(&game("garbage", "e4")).await?,
            PositionOutcome::Dropped
        );
        assert!(commentator.context().current_position().is_none());

        commentator.process_game_update(&game(START, "e4")).await?;
        assert_eq!(
            commentator.process_game_update(&game("8/8/8", "e5")).await?,
            PositionOutcome::Dropped
        );
        assert_eq!(
            commentator.context().current_position(),
            Some(&BoardState::from_fen(START)?)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_generator_failure_still_records_position() {
        let mut generator = MockCommentaryGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("rate limited")));
        let mut sink = MockSpeechSink::new();
        sink.expect_speak().never();
        let mut commentator = Commentator::new(generator, sink);

        let result = commentator.process_game_update(&game(START, "e4")).await;

        assert!(result.is_err());
        assert!(commentator.context().startup_done());
        assert!(commentator.context().current_position().is_some());
    }

    #[tokio::test]
    async fn test_eval_before_startup_is_suppressed() -> Result<()> {
        let mut commentator = expecting(&[]);
        assert_eq!(commentator.process_eval_update(&eval()).await?, EvalOutcome::Suppressed);
        assert!(commentator.context().last_spoken_eval_at().is_none());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_eval_within_cooldown_is_suppressed() -> Result<()> {
        let mut commentator = expecting(&["startup", "eval"]);
        commentator.process_game_update(&game(START, "e4")).await?;

        assert_eq!(commentator.process_eval_update(&eval()).await?, EvalOutcome::Spoken);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(commentator.process_eval_update(&eval()).await?, EvalOutcome::Suppressed);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_eval_cooldown_is_strict() -> Result<()> {
        let mut commentator = expecting(&["startup", "eval", "eval"]);
        commentator.process_game_update(&game(START, "e4")).await?;

        assert_eq!(commentator.process_eval_update(&eval()).await?, EvalOutcome::Spoken);
        tokio::time::advance(EVALUATION_COMMENTARY_COOLDOWN).await;
        assert_eq!(commentator.process_eval_update(&eval()).await?, EvalOutcome::Suppressed);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(commentator.process_eval_update(&eval()).await?, EvalOutcome::Spoken);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_eval_emissions_over_a_window_are_bounded() -> Result<()> {
        // One update per minute for an hour: spoken at 0, 11, 22, 33, 44 and 55 minutes.
        let window = Duration::from_secs(60 * 60);
        let step = Duration::from_secs(60);
        let mut kinds = vec!["startup"];
        kinds.extend(std::iter::repeat("eval").take(6));
        let mut commentator = expecting(&kinds);
        commentator.process_game_update(&game(START, "e4")).await?;

        let mut spoken = 0u32;
        let mut elapsed = Duration::ZERO;
        while elapsed <= window {
            if commentator.process_eval_update(&eval()).await? == EvalOutcome::Spoken {
                spoken += 1;
            }
            tokio::time::advance(step).await;
            elapsed += step;
        }

        let cooldowns = (window.as_secs() / EVALUATION_COMMENTARY_COOLDOWN.as_secs()) as u32;
        assert!(spoken <= cooldowns + 1);
        assert_eq!(spoken, 6);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_still_starts_cooldown() -> Result<()> {
        let mut generator = MockCommentaryGenerator::new();
        generator.expect_generate().times(2).returning(|_| Ok("line".to_string()));
        let mut sink = MockSpeechSink::new();
        let mut seq = mockall::Sequence::new();
        sink.expect_speak().times(1).in_sequence(&mut seq).returning(|_| Ok(()));
        sink.expect_speak()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow::anyhow!("no output device")));
        let mut commentator = Commentator::new(generator, sink);
        commentator.process_game_update(&game(START, "e4")).await?;

        assert!(commentator.process_eval_update(&eval()).await.is_err());
        assert!(commentator.context().last_spoken_eval_at().is_some());
        assert_eq!(commentator.process_eval_update(&eval()).await?, EvalOutcome::Suppressed);
        Ok(())
    }
}
