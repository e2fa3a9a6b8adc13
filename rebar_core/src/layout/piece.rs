//! # Pieces
//!
//! A [`Piece`] is one run of additional (or typical) steel in a mesh. It moves
//! through three extents:
//!
//! - **theoretical**: where the diagram says steel is required
//! - **practical**: extended by the development rules (D or Ld)
//! - **executive**: rounded to a manufacturable length and merged
//!
//! Runs longer than a stock bar are spliced. The split into stock bars is
//! [`Piece::subpieces`]; the short bar goes to the bent end so the full
//! 12 m bars start from the straight end.
//!
//! ## Net Length
//!
//! ```text
//! L <= 12            : L
//! n = ceil((L - o) / (12 - o))
//! net                = L + (n - 1) * o
//! shortest bar       = net - (n - 1) * 12
//! ```
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::layout::piece::{net_length, shortest_piece_net_length};
//!
//! assert_eq!(net_length(13.0, 1.0), 14.0);
//! assert_eq!(shortest_piece_net_length(13.0, 1.0), 2.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::geometry::{Bend, Period};
use crate::materials::Rebar;
use crate::rounding::round_to;

/// Stock bar length in meters
pub const STANDARD_LENGTH: f64 = 12.0;

/// Handle to a piece in a container arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PieceId(pub usize);

/// Which extent of a piece a query looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Theoretical,
    Practical,
    Executive,
}

/// Rule that governed how far a piece end was extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DominationType {
    /// Effective depth past the next shorter bar
    D,
    /// Development length past the next shorter bar
    Ld,
}

/// Governing rule at each end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domination {
    pub start: DominationType,
    pub end: DominationType,
}

/// How far through the theoretical → executive pipeline a piece has gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Theoretical,
    Practical,
    Rounded,
    Executive,
}

/// Number of stock bars needed for a run of `length`.
pub fn segment_count(length: f64, overlap: f64) -> usize {
    let length = round_to(length, 3);
    if length <= STANDARD_LENGTH {
        1
    } else {
        round_to((length - overlap) / (STANDARD_LENGTH - overlap), 3).ceil() as usize
    }
}

/// Total bar length for a run, counting every lap splice.
pub fn net_length(length: f64, overlap: f64) -> f64 {
    let length = round_to(length, 3);
    if length <= STANDARD_LENGTH {
        return length;
    }
    let n = segment_count(length, overlap) as f64;
    (n - 1.0) * overlap + length
}

/// Length of the one bar of a run that is not a full stock bar.
pub fn shortest_piece_net_length(length: f64, overlap: f64) -> f64 {
    let length = round_to(length, 3);
    if length <= STANDARD_LENGTH {
        return length;
    }
    let n = segment_count(length, overlap) as f64;
    net_length(length, overlap) - (n - 1.0) * STANDARD_LENGTH
}

/// One run of steel in a mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Piece {
    pub rebar: Rebar,
    pub theoretical: Period,
    pub practical: Period,
    pub executive: Period,
    pub bend: Bend,
    pub domination: Option<Domination>,
    /// Rounded (later catalog) length of the shortest stock bar
    pub shortest_piece_length: Option<f64>,
    pub length_upper_bound: Option<f64>,
    pub stage: Stage,
}

impl Piece {
    pub fn new(rebar: Rebar, theoretical: Period) -> Self {
        Piece {
            rebar,
            theoretical,
            practical: theoretical,
            executive: theoretical,
            bend: Bend::default(),
            domination: None,
            shortest_piece_length: None,
            length_upper_bound: None,
            stage: Stage::Theoretical,
        }
    }

    /// Drop everything derived from the theoretical period.
    ///
    /// The theoretical period itself is kept, including any clamping the
    /// bend step applied to it.
    pub fn refresh(&mut self) {
        self.practical = self.theoretical;
        self.executive = self.theoretical;
        self.bend = Bend::default();
        self.domination = None;
        self.shortest_piece_length = None;
        self.length_upper_bound = None;
        self.stage = Stage::Theoretical;
    }

    pub fn period(&self, kind: PeriodKind) -> Period {
        match kind {
            PeriodKind::Theoretical => self.theoretical,
            PeriodKind::Practical => self.practical,
            PeriodKind::Executive => self.executive,
        }
    }

    pub fn period_mut(&mut self, kind: PeriodKind) -> &mut Period {
        match kind {
            PeriodKind::Theoretical => &mut self.theoretical,
            PeriodKind::Practical => &mut self.practical,
            PeriodKind::Executive => &mut self.executive,
        }
    }

    /// Shortest stock bar length of the given extent.
    pub fn shortest_length(&self, kind: PeriodKind) -> f64 {
        shortest_piece_net_length(self.period(kind).length(), self.rebar.overlap())
    }

    /// Number of stock bars for the given extent.
    pub fn num_of_pieces(&self, kind: PeriodKind) -> usize {
        segment_count(self.period(kind).length(), self.rebar.overlap())
    }

    /// Stock bar count of the bar as it will be cut: executive once the
    /// executive period is known, practical before that.
    pub fn required_num_of_pieces(&self) -> usize {
        if self.stage == Stage::Executive {
            self.num_of_pieces(PeriodKind::Executive)
        } else {
            self.num_of_pieces(PeriodKind::Practical)
        }
    }

    /// Whether two pieces have the same extents and bends.
    pub fn same_geometry(&self, other: &Piece) -> bool {
        self.theoretical == other.theoretical
            && self.practical == other.practical
            && self.executive == other.executive
            && self.bend == other.bend
    }

    /// Split the executive run into stock bars.
    ///
    /// Interior bars are full stock length and neighbours overlap by the lap
    /// length. The short bar goes to the straight end when exactly one end is
    /// bent, and to the end otherwise. When the short bar was rounded up the extra length
    /// goes into the lap next to it.
    pub fn subpieces(&self) -> Vec<Piece> {
        if round_to(self.executive.length(), 3) <= STANDARD_LENGTH {
            return vec![self.clone()];
        }
        let overlap = self.rebar.overlap();
        let exec_shortest = self.shortest_length(PeriodKind::Executive);
        let shortest = self.shortest_piece_length.unwrap_or(exec_shortest);
        let middle_count = self.num_of_pieces(PeriodKind::Executive).saturating_sub(2);
        let short_at_start = self.bend.end > 0.0 && self.bend.start <= 0.0;

        let mut pieces = Vec::with_capacity(middle_count + 2);
        let mut end;
        if short_at_start {
            end = self.executive.start + shortest;
            pieces.push(self.segment(
                clip_end(self.theoretical.start, end),
                clip_end(self.practical.start, end),
                Period::new(self.executive.start, end),
                Bend::new(self.bend.start, 0.0),
            ));
            end = self.executive.start + exec_shortest;
        } else {
            end = self.executive.start + STANDARD_LENGTH;
            pieces.push(self.segment(
                Period::new(self.theoretical.start, end),
                Period::new(self.practical.start, end),
                Period::new(self.executive.start, end),
                Bend::new(self.bend.start, 0.0),
            ));
        }

        for _ in 0..middle_count {
            let start = end - overlap;
            end = start + STANDARD_LENGTH;
            let full = Period::new(start, end);
            pieces.push(self.segment(full, full, full, Bend::default()));
        }

        if short_at_start {
            let start = end - overlap;
            end = start + STANDARD_LENGTH;
            pieces.push(self.segment(
                Period::new(start, self.theoretical.end),
                Period::new(start, self.practical.end),
                Period::new(start, end),
                Bend::new(0.0, self.bend.end),
            ));
        } else {
            let start = end - (shortest - exec_shortest) - overlap;
            pieces.push(self.segment(
                clip_start(start, self.theoretical.end),
                clip_start(start, self.practical.end),
                Period::new(start, start + shortest),
                Bend::new(0.0, self.bend.end),
            ));
        }
        pieces
    }

    fn segment(&self, theoretical: Period, practical: Period, executive: Period, bend: Bend) -> Piece {
        Piece {
            rebar: self.rebar,
            theoretical,
            practical,
            executive,
            bend,
            domination: None,
            shortest_piece_length: None,
            length_upper_bound: None,
            stage: Stage::Executive,
        }
    }
}

/// `[start, end]`, or an empty period at `end` when `start` is past it.
fn clip_end(start: f64, end: f64) -> Period {
    if start < end {
        Period::new(start, end)
    } else {
        Period::new(end, end)
    }
}

/// `[start, end]`, or an empty period at `start` when `end` is before it.
fn clip_start(start: f64, end: f64) -> Period {
    if end > start {
        Period::new(start, end)
    } else {
        Period::new(start, start)
    }
}

impl std::fmt::Display for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Piece {} theoretical {} practical {} executive {} bend [{}, {}]",
            self.rebar.rebar_type, self.theoretical, self.practical, self.executive, self.bend.start, self.bend.end
        )
    }
}
