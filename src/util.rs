// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

/// Gain at or below this many decibels is treated as silence.
pub const SILENCE_DB: f64 = -80.0;

/// Converts a normalized linear gain (0.0 to 1.0) to decibels.
///
/// Zero and negative values map to [`SILENCE_DB`] rather than negative
/// infinity so the result stays usable as a native volume value.
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        return SILENCE_DB;
    }
    (20.0 * linear.log10()).max(SILENCE_DB)
}

/// Converts a decibel value back to normalized linear gain.
pub fn db_to_linear(db: f64) -> f64 {
    if db <= SILENCE_DB {
        return 0.0;
    }
    10f64.powf(db / 20.0)
}

/// Linear interpolation between `from` and `to` by `alpha` in [0, 1].
pub fn lerp(from: f64, to: f64, alpha: f64) -> f64 {
    from + (to - from) * alpha
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_linear_db_round_trip() {
        assert_eq!(0.0, linear_to_db(1.0));
        assert_eq!(1.0, db_to_linear(0.0));

        let half_db = linear_to_db(0.5);
        assert!((half_db + 6.0206).abs() < 0.001);
        assert!((db_to_linear(half_db) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_silence_floor() {
        assert_eq!(SILENCE_DB, linear_to_db(0.0));
        assert_eq!(SILENCE_DB, linear_to_db(-1.0));
        assert_eq!(0.0, db_to_linear(SILENCE_DB));
        assert_eq!(0.0, db_to_linear(-200.0));

        // Tiny but non-zero gains clamp to the floor instead of running away.
        assert_eq!(SILENCE_DB, linear_to_db(1e-9));
    }

    #[test]
    fn test_lerp() {
        assert_eq!(0.0, lerp(0.0, 1.0, 0.0));
        assert_eq!(0.5, lerp(0.0, 1.0, 0.5));
        assert_eq!(1.0, lerp(0.0, 1.0, 1.0));
        assert_eq!(0.75, lerp(1.0, 0.5, 0.5));
    }
}
