//! Board positions as reported by the feed and SAN move resolution.

use cozy_chess::{Board, Move, Piece, Square};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("Invalid position {0:?}")]
    InvalidPosition(String),
}

/// Outcome of interpreting a SAN move against a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveCheck {
    Legal(Move),
    Illegal,
}

/// A parsed position. Two states are equal when their normalised FEN is,
/// so move counters take part in the comparison. The en passant square is
/// only kept when an en passant capture is actually legal.
#[derive(Debug, Clone)]
pub struct BoardState {
    board: Board,
    fen: String,
}

impl BoardState {
    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let board: Board = fen
            .trim()
            .parse()
            .map_err(|_| PositionError::InvalidPosition(fen.to_string()))?;
        let fen = normalised_fen(&board);
        Ok(Self { board, fen })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn fen(&self) -> &str {
        &self.fen
    }

    /// Checks whether `san` names exactly one legal move in this position.
    pub fn check_move(&self, san: &str) -> MoveCheck {
        match resolve_san(&self.board, san) {
            Some(mv) => MoveCheck::Legal(mv),
            None => MoveCheck::Illegal,
        }
    }
}

impl PartialEq for BoardState {
    fn eq(&self, other: &Self) -> bool {
        self.fen == other.fen
    }
}

impl Eq for BoardState {}

fn legal_moves(board: &Board) -> Vec<Move> {
    let mut moves = Vec::new();
    board.generate_moves(|piece_moves| {
        moves.extend(piece_moves);
        false
    });
    moves
}

fn has_en_passant_capture(board: &Board) -> bool {
    let Some(file) = board.en_passant() else {
        return false;
    };
    legal_moves(board).iter().any(|mv| {
        board.piece_on(mv.from) == Some(Piece::Pawn)
            && mv.to.file() == file
            && mv.from.file() != mv.to.file()
            && board.piece_on(mv.to).is_none()
    })
}

fn normalised_fen(board: &Board) -> String {
    let fen = board.to_string();
    if board.en_passant().is_none() || has_en_passant_capture(board) {
        return fen;
    }
    fen.split(' ')
        .enumerate()
        .map(|(idx, field)| if idx == 3 { "-" } else { field })
        .collect::<Vec<_>>()
        .join(" ")
}

fn piece_from_letter(letter: u8) -> Option<Piece> {
    match letter {
        b'K' => Some(Piece::King),
        b'Q' => Some(Piece::Queen),
        b'R' => Some(Piece::Rook),
        b'B' => Some(Piece::Bishop),
        b'N' => Some(Piece::Knight),
        _ => None,
    }
}

/// Castling moves are encoded king-takes-own-rook.
fn is_castle(board: &Board, mv: &Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::King) && board.color_on(mv.to) == Some(board.side_to_move())
}

/// Finds the unique legal move matching `san`, or `None` when the text is
/// unparseable, illegal or ambiguous.
fn resolve_san(board: &Board, san: &str) -> Option<Move> {
    let clean = san
        .trim()
        .trim_end_matches(|c: char| matches!(c, '+' | '#' | '!' | '?'));
    if clean.is_empty() {
        return None;
    }

    let legal = legal_moves(board);

    let kingside = match clean {
        "O-O" | "0-0" => Some(true),
        "O-O-O" | "0-0-0" => Some(false),
        _ => None,
    };
    if let Some(kingside) = kingside {
        return legal.into_iter().find(|mv| {
            is_castle(board, mv) && ((mv.to.file() as u8 > mv.from.file() as u8) == kingside)
        });
    }

    let (piece, rest) = match piece_from_letter(clean.as_bytes()[0]) {
        Some(piece) => (piece, &clean[1..]),
        None => (Piece::Pawn, clean),
    };

    // Promotion is written `e8=Q` or `e8Q`.
    let (rest, promotion) = match rest.find('=') {
        Some(eq) => (&rest[..eq], Some(piece_from_letter(*rest.as_bytes().get(eq + 1)?)?)),
        None => match rest.as_bytes().last().copied().and_then(piece_from_letter) {
            Some(promo) if piece == Piece::Pawn => (&rest[..rest.len() - 1], Some(promo)),
            _ => (rest, None),
        },
    };

    let rest = rest.replace(['x', ':', '-'], "");
    if rest.len() < 2 || !rest.is_ascii() {
        return None;
    }
    let dest: Square = rest[rest.len() - 2..].parse().ok()?;
    let disambiguation = &rest.as_bytes()[..rest.len() - 2];

    let mut candidates = legal.into_iter().filter(|mv| {
        mv.to == dest
            && board.piece_on(mv.from) == Some(piece)
            && mv.promotion == promotion
            && !is_castle(board, mv)
            && disambiguation.iter().all(|&b| match b {
                b'a'..=b'h' => mv.from.file() as u8 == b - b'a',
                b'1'..=b'8' => mv.from.rank() as u8 == b - b'1',
                _ => false,
            })
    });

    let mv = candidates.next()?;
    match candidates.next() {
        Some(_) => None,
        None => Some(mv),
    }
}
