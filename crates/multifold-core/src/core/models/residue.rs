//! Amino-acid alphabets used by the feature encoders.
//!
//! Two orderings coexist: the residue-type order used for `aatype` and assembled MSAs, and
//! the HHblits order used for per-chain MSA rows as they come out of the search tools.

/// The 20 standard residue types in feature order.
pub const RESTYPES: [char; 20] = [
    'A', 'R', 'N', 'D', 'C', 'Q', 'E', 'G', 'H', 'I', 'L', 'K', 'M', 'F', 'P', 'S', 'T', 'W',
    'Y', 'V',
];

/// Index of the unknown residue `X` in the residue-type alphabet.
pub const UNKNOWN_RESTYPE: i64 = 20;

/// Index of the alignment gap in the residue-type alphabet extended with `X` and `-`.
pub const GAP_RESTYPE: i64 = 21;

/// HHblits alphabet: `ACDEFGHIKLMNPQRSTVWYX-`.
const HHBLITS_ORDER: [char; 22] = [
    'A', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'V',
    'W', 'Y', 'X', '-',
];

/// Index of the gap character in the HHblits alphabet.
pub const HHBLITS_GAP: i64 = 21;

pub fn restype_index(residue: char) -> i64 {
    let upper = residue.to_ascii_uppercase();
    RESTYPES
        .iter()
        .position(|&r| r == upper)
        .map_or(UNKNOWN_RESTYPE, |i| i as i64)
}

/// Encodes one aligned residue into the HHblits alphabet, folding ambiguity codes the way
/// HHblits itself does (`B -> D`, `Z -> E`, `U -> C`, `J`/`O` unknown).
pub fn hhblits_index(residue: char) -> i64 {
    let folded = match residue.to_ascii_uppercase() {
        'B' => 'D',
        'Z' => 'E',
        'U' => 'C',
        'J' | 'O' => 'X',
        other => other,
    };
    HHBLITS_ORDER
        .iter()
        .position(|&r| r == folded)
        .map_or(20, |i| i as i64)
}

/// Maps an HHblits alphabet index onto the residue-type alphabet extended with `X` and `-`.
pub fn hhblits_to_restype(index: i64) -> i64 {
    match usize::try_from(index).ok().and_then(|i| HHBLITS_ORDER.get(i)) {
        Some('-') => GAP_RESTYPE,
        Some(&c) => restype_index(c),
        None => UNKNOWN_RESTYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restype_index_maps_standard_and_unknown_residues() {
        assert_eq!(restype_index('A'), 0);
        assert_eq!(restype_index('v'), 19);
        assert_eq!(restype_index('B'), UNKNOWN_RESTYPE);
    }

    #[test]
    fn hhblits_index_folds_ambiguity_codes() {
        assert_eq!(hhblits_index('A'), 0);
        assert_eq!(hhblits_index('B'), hhblits_index('D'));
        assert_eq!(hhblits_index('Z'), hhblits_index('E'));
        assert_eq!(hhblits_index('U'), hhblits_index('C'));
        assert_eq!(hhblits_index('-'), HHBLITS_GAP);
        assert_eq!(hhblits_index('J'), 20);
    }

    #[test]
    fn hhblits_ids_round_trip_into_restype_order() {
        for &c in RESTYPES.iter() {
            assert_eq!(hhblits_to_restype(hhblits_index(c)), restype_index(c));
        }
        assert_eq!(hhblits_to_restype(HHBLITS_GAP), GAP_RESTYPE);
        assert_eq!(hhblits_to_restype(20), UNKNOWN_RESTYPE);
    }
}
