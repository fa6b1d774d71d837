/// Latest move and resulting position of the game being broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameUpdate {
    fen_position: String,
    last_move_san: String,
    white_name: String,
    black_name: String,
}

impl GameUpdate {
    pub fn new(fen_position: &str, last_move_san: &str, white_name: &str, black_name: &str) -> Self {
        Self {
            fen_position: fen_position.to_string(),
            last_move_san: last_move_san.to_string(),
            white_name: white_name.to_string(),
            black_name: black_name.to_string(),
        }
    }

    pub fn fen_position(&self) -> &str {
        &self.fen_position
    }

    pub fn last_move_san(&self) -> &str {
        &self.last_move_san
    }

    pub fn white_name(&self) -> &str {
        &self.white_name
    }

    pub fn black_name(&self) -> &str {
        &self.black_name
    }
}

/// Engine opinion on the current position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalUpdate {
    engine_name: String,
    evaluation: String,
    best_line: String,
}

impl EvalUpdate {
    pub fn new(engine_name: &str, evaluation: &str, best_line: &str) -> Self {
        Self {
            engine_name: engine_name.to_string(),
            evaluation: evaluation.to_string(),
            best_line: best_line.to_string(),
        }
    }

    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    pub fn evaluation(&self) -> &str {
        &self.evaluation
    }

    pub fn best_line(&self) -> &str {
        &self.best_line
    }
}
