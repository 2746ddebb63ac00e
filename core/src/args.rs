use std::path::PathBuf;

use clap::Parser;
use goban::{Board, BoardPosition, Move, Player, Point, Ruleset, DEFAULT_KOMI};

use crate::device::DeviceKind;

#[derive(Parser, Debug)]
#[command(name = "kataeval")]
#[command(author = "Jørgen Hanssen <jorgen@hanssen.io>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate a 19x19 Go position with a KataGo network")]
pub struct Args {
    /// KataGo weight file (.bin or .bin.gz).
    #[arg(short, long)]
    pub model: PathBuf,

    /// Black stones, e.g. "D4,Q16".
    #[arg(short, long, value_delimiter = ',')]
    pub black: Vec<Point>,

    /// White stones, e.g. "Q4,D16".
    #[arg(short, long, value_delimiter = ',')]
    pub white: Vec<Point>,

    /// Recent moves, oldest first, e.g. "B:D4,W:Q4,B:pass".
    #[arg(long, value_delimiter = ',')]
    pub history: Vec<Move>,

    /// Player to move. Defaults to the opponent of the last move, or black.
    #[arg(short, long)]
    pub to_move: Option<Player>,

    /// Point of a simple ko the player to move may not retake.
    #[arg(long)]
    pub ko: Option<Point>,

    #[arg(short, long, default_value_t = DEFAULT_KOMI)]
    pub komi: f32,

    /// japanese (territory) or chinese (area).
    #[arg(short, long, default_value = "japanese")]
    pub rules: Ruleset,

    /// Treat the position as the root of an analysis right after a pass.
    #[arg(long)]
    pub conservative_pass: bool,

    /// Where to run the network.
    #[arg(long, value_enum, default_value_t = DeviceKind::Auto)]
    pub device: DeviceKind,

    /// Accelerator ordinal for `--device cuda` or `metal`.
    #[arg(long, default_value_t = 0)]
    pub gpu: usize,

    /// Number of policy moves to print.
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Write the log to a file instead of stderr.
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn position(&self) -> BoardPosition {
        let board = Board::empty()
            .with_stones(Player::Black, &self.black)
            .with_stones(Player::White, &self.white);

        let to_move = self.to_move.unwrap_or_else(|| match self.history.last() {
            Some(last) => last.player.opponent(),
            None => Player::Black,
        });

        BoardPosition::new(board, to_move)
            .with_history(self.history.clone())
            .with_komi(self.komi)
            .with_rules(self.rules)
            .with_ko(self.ko)
            .with_conservative_pass(self.conservative_pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("kataeval").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn to_move_follows_history() {
        let args = parse(&["--model", "m.bin", "--history", "B:D4,W:pass"]);
        let position = args.position();
        assert_eq!(position.to_move, Player::Black);
        assert_eq!(position.history.len(), 2);

        let args = parse(&["-m", "m.bin", "--history", "B:D4"]);
        assert_eq!(args.position().to_move, Player::White);
    }

    #[test]
    fn stones_and_rules_are_applied() {
        let args = parse(&[
            "-m", "m.bin", "-b", "D4,Q16", "-w", "Q4", "-r", "chinese", "-k", "7.5", "-t", "w",
        ]);
        let position = args.position();
        assert_eq!(position.board.stones().count(), 3);
        assert_eq!(position.rules, Ruleset::Chinese);
        assert_eq!(position.komi, 7.5);
        assert_eq!(position.to_move, Player::White);
    }

    #[test]
    fn device_defaults_to_auto() {
        let args = parse(&["-m", "m.bin"]);
        assert_eq!(args.device, DeviceKind::Auto);
        assert_eq!(args.gpu, 0);

        let args = parse(&["-m", "m.bin", "--device", "cuda", "--gpu", "1"]);
        assert_eq!(args.device, DeviceKind::Cuda);
        assert_eq!(args.gpu, 1);

        assert!(Args::try_parse_from(["kataeval", "-m", "m.bin", "--device", "tpu"]).is_err());
    }

    #[test]
    fn bad_coordinates_are_rejected() {
        let result = Args::try_parse_from(["kataeval", "-m", "m.bin", "-b", "Z99"]);
        assert!(result.is_err());
    }
}
