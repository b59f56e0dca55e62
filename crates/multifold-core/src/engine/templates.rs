use super::search::{SearchError, TemplateSearch, check_database, execute};
use crate::core::features::template::{AlignedTemplate, atom_index, make_template_features};
use crate::core::io::mmcif::{MmcifFile, Structure};
use crate::core::io::traits::TextFormat;
use crate::core::models::features::FeatureSet;
use crate::core::models::msa::Msa;
use crate::core::models::sequence::SequenceRecord;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, instrument};

/// Templates kept per chain.
const MAX_TEMPLATES: usize = 20;

/// A hit aligning this much of the query residue for residue is the query's own entry.
const DUPLICATE_COVERAGE: f64 = 0.95;

/// One `hmmsearch -A` row projected onto the model's match columns.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TemplateHit {
    /// `{pdb_id}_{chain}` as named in `pdb_seqres`.
    name: String,
    /// Per query position: the aligned residue and its 1-based position in the hit's
    /// full sequence.
    residues: Vec<Option<(char, i64)>>,
}

impl TemplateHit {
    fn pdb_id_and_chain(&self) -> Option<(&str, &str)> {
        self.name.split_once('_')
    }

    fn duplicates(&self, query: &str) -> bool {
        let mut aligned = 0usize;
        for (residue, q) in self.residues.iter().zip(query.chars()) {
            if let Some((r, _)) = residue {
                if !r.eq_ignore_ascii_case(&q) {
                    return false;
                }
                aligned += 1;
            }
        }
        !query.is_empty() && aligned as f64 / query.chars().count() as f64 > DUPLICATE_COVERAGE
    }
}

/// Template search with HMMER: `hmmbuild` turns the uniref90 alignment into a profile whose
/// match states are the query positions, `hmmsearch` scans `pdb_seqres` with it, and the
/// hits released on or before the cutoff date are read from their mmCIF entries.
#[derive(Debug, Clone)]
pub struct Hmmsearch {
    hmmbuild: PathBuf,
    hmmsearch: PathBuf,
    pdb_seqres: PathBuf,
    mmcif_dir: PathBuf,
    max_template_date: NaiveDate,
    n_cpu: usize,
}

impl Hmmsearch {
    pub fn new(
        pdb_seqres: PathBuf,
        mmcif_dir: PathBuf,
        max_template_date: NaiveDate,
        n_cpu: usize,
    ) -> Self {
        Self {
            hmmbuild: PathBuf::from("hmmbuild"),
            hmmsearch: PathBuf::from("hmmsearch"),
            pdb_seqres,
            mmcif_dir,
            max_template_date,
            n_cpu,
        }
    }

    pub fn with_binaries(mut self, hmmbuild: impl Into<PathBuf>, hmmsearch: impl Into<PathBuf>) -> Self {
        self.hmmbuild = hmmbuild.into();
        self.hmmsearch = hmmsearch.into();
        self
    }

    fn build_command(&self, alignment: &Path, profile: &Path) -> Command {
        let mut command = Command::new(&self.hmmbuild);
        command
            .args(["--hand", "--amino"])
            .arg(profile)
            .arg(alignment);
        command
    }

    fn search_command(&self, profile: &Path, hits: &Path) -> Command {
        let mut command = Command::new(&self.hmmsearch);
        command
            .arg("--noali")
            .arg("--cpu")
            .arg(self.n_cpu.to_string())
            .args(["--F1", "0.1", "--F2", "0.1", "--F3", "0.1"])
            .args(["--incE", "100", "-E", "100", "--domE", "100", "--incdomE", "100"])
            .arg("-A")
            .arg(hits)
            .arg(profile)
            .arg(&self.pdb_seqres);
        command
    }

    fn load_structure(&self, pdb_id: &str) -> Option<Structure> {
        let path = self.mmcif_dir.join(format!("{}.cif", pdb_id.to_ascii_lowercase()));
        match MmcifFile::read_from_path(&path) {
            Ok(structure) => Some(structure),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping template without a readable structure");
                None
            }
        }
    }

    fn align(&self, hit: &TemplateHit, structures: &mut HashMap<String, Option<Structure>>) -> Option<AlignedTemplate> {
        let (pdb_id, chain) = hit.pdb_id_and_chain()?;
        let structure = structures
            .entry(pdb_id.to_ascii_lowercase())
            .or_insert_with(|| self.load_structure(pdb_id))
            .as_ref()?;

        match structure.release_date {
            Some(date) if date <= self.max_template_date => {}
            date => {
                debug!(template = %hit.name, ?date, "Skipping template released after the cutoff");
                return None;
            }
        }
        if !structure.has_chain(chain) {
            debug!(template = %hit.name, "Skipping template whose chain has no coordinates");
            return None;
        }

        let mut template = AlignedTemplate::unaligned(hit.name.clone(), hit.residues.len());
        for (i, residue) in hit.residues.iter().enumerate() {
            let Some((code, seq_id)) = residue else {
                continue;
            };
            template.sequence[i] = *code;
            let Some(atoms) = structure.residue(chain, *seq_id) else {
                continue;
            };
            for (name, position) in atoms {
                if let Some(slot) = atom_index(name) {
                    template.positions[i][slot] = *position;
                    template.mask[i][slot] = 1.0;
                }
            }
        }
        Some(template)
    }
}

impl TemplateSearch for Hmmsearch {
    #[instrument(skip_all, name = "hmmsearch", fields(chain = %record.id))]
    fn search(
        &self,
        record: &SequenceRecord,
        uniref90: &Msa,
        output_dir: &Path,
    ) -> Result<FeatureSet, SearchError> {
        check_database(&self.pdb_seqres)?;
        let alignment = output_dir.join("template_profile_input.sto");
        let profile = output_dir.join("template_profile.hmm");
        let hits_path = output_dir.join("pdb_hits.sto");

        fs::write(&alignment, profile_input(uniref90))
            .map_err(|e| SearchError::Template(format!("cannot write '{}': {e}", alignment.display())))?;
        execute("hmmbuild", self.build_command(&alignment, &profile))?;
        execute("hmmsearch", self.search_command(&profile, &hits_path))?;

        let text = fs::read_to_string(&hits_path)
            .map_err(|e| SearchError::Template(format!("cannot read '{}': {e}", hits_path.display())))?;
        let hits = parse_hits(&text, record.len())?;

        let mut seen = HashSet::new();
        let mut structures = HashMap::new();
        let mut templates = Vec::new();
        for hit in &hits {
            if templates.len() == MAX_TEMPLATES {
                break;
            }
            if !seen.insert(hit.name.clone()) || hit.duplicates(&record.sequence) {
                continue;
            }
            if let Some(template) = self.align(hit, &mut structures) {
                templates.push(template);
            }
        }
        info!(hits = hits.len(), templates = templates.len(), "Template search finished");

        make_template_features(record.len(), &templates)
            .map_err(|e| SearchError::Template(e.to_string()))
    }
}

/// Stockholm input for `hmmbuild --hand`: every column is a match state, so profile
/// positions are query positions.
fn profile_input(msa: &Msa) -> String {
    let mut out = String::from("# STOCKHOLM 1.0\n\n");
    let width = msa.width();
    for (i, sequence) in msa.sequences().iter().enumerate() {
        let _ = writeln!(out, "row{i} {sequence}");
    }
    let _ = writeln!(out, "#=GC RF {}", "x".repeat(width));
    out.push_str("//\n");
    out
}

/// Parses `hmmsearch -A` output into hits over `query_len` match columns.
fn parse_hits(text: &str, query_len: usize) -> Result<Vec<TemplateHit>, SearchError> {
    let mut order: Vec<String> = Vec::new();
    let mut rows: HashMap<String, String> = HashMap::new();
    let mut reference = String::new();

    for line in text.lines() {
        let line = line.trim();
        if let Some(rf) = line.strip_prefix("#=GC RF") {
            reference.push_str(rf.trim());
            continue;
        }
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(name), Some(fragment)) = (fields.next(), fields.next()) else {
            continue;
        };
        rows.entry(name.to_string())
            .or_insert_with(|| {
                order.push(name.to_string());
                String::new()
            })
            .push_str(fragment);
    }

    let matches = reference.chars().filter(|&c| c != '.').count();
    if !order.is_empty() && matches != query_len {
        return Err(SearchError::Template(format!(
            "profile has {matches} match columns for a {query_len}-residue query"
        )));
    }

    let mut hits = Vec::with_capacity(order.len());
    for label in order {
        let row = &rows[&label];
        if row.chars().count() != reference.chars().count() {
            return Err(SearchError::Template(format!(
                "row '{label}' does not span the alignment"
            )));
        }
        let (name, start) = match label.split_once('/') {
            Some((name, range)) => {
                let start = range
                    .split('-')
                    .next()
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(1);
                (name.to_string(), start)
            }
            None => (label.clone(), 1),
        };

        let mut position = start;
        let mut residues = Vec::with_capacity(query_len);
        for (column, residue) in reference.chars().zip(row.chars()) {
            let is_residue = residue.is_ascii_alphabetic();
            if column != '.' {
                residues.push(is_residue.then(|| (residue.to_ascii_uppercase(), position)));
            }
            if is_residue {
                position += 1;
            }
        }
        hits.push(TemplateHit { name, residues });
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::template::ATOM_TYPE_NUM;
    use crate::core::models::ids::ChainId;
    use tempfile::tempdir;

    const HITS: &str = "\
# STOCKHOLM 1.0

#=GS 1abc_A/3-6 DE mol:protein length:10 MYOGLOBIN
1abc_A/3-6      MKi-V
2xyz_B/1-2      -Kg..
#=GC RF         xx.xx
//
";

    const CIF: &str = "\
data_1ABC
_pdbx_database_status.recvd_initial_deposition_date 1999-01-01
loop_
_atom_site.label_atom_id
_atom_site.auth_asym_id
_atom_site.label_seq_id
_atom_site.Cartn_x
_atom_site.Cartn_y
_atom_site.Cartn_z
N  A 3 1.0 0.0 0.0
CA A 3 2.0 0.0 0.0
CA A 4 3.0 0.0 0.0
CA A 6 4.0 0.0 0.0
";

    fn record(sequence: &str) -> SequenceRecord {
        SequenceRecord::new(ChainId::from_index(0).unwrap(), sequence, "query")
    }

    fn search(dir: &Path, cutoff: (i32, u32, u32)) -> Hmmsearch {
        Hmmsearch::new(
            dir.join("pdb_seqres.txt"),
            dir.join("mmcif"),
            NaiveDate::from_ymd_opt(cutoff.0, cutoff.1, cutoff.2).unwrap(),
            2,
        )
    }

    #[test]
    fn hits_are_projected_onto_match_columns() {
        let hits = parse_hits(HITS, 4).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "1abc_A");
        assert_eq!(
            hits[0].residues,
            [Some(('M', 3)), Some(('K', 4)), None, Some(('V', 6))]
        );
        assert_eq!(hits[1].residues, [None, Some(('K', 1)), None, None]);
    }

    #[test]
    fn profile_width_must_match_the_query() {
        assert!(matches!(parse_hits(HITS, 5), Err(SearchError::Template(_))));
        assert!(parse_hits("# STOCKHOLM 1.0\n//\n", 5).unwrap().is_empty());
    }

    #[test]
    fn profile_input_marks_every_column_as_match() {
        let msa = Msa::single("MKV", "query");
        let text = profile_input(&msa);
        assert!(text.starts_with("# STOCKHOLM 1.0"));
        assert!(text.contains("row0 MKV\n"));
        assert!(text.contains("#=GC RF xxx\n"));
        assert!(text.ends_with("//\n"));
    }

    #[test]
    fn commands_point_at_the_profile_and_database() {
        let dir = tempdir().unwrap();
        let tool = search(dir.path(), (2022, 1, 1)).with_binaries("/opt/hmmbuild", "/opt/hmmsearch");
        let build = tool.build_command(Path::new("in.sto"), Path::new("out.hmm"));
        assert_eq!(build.get_program(), "/opt/hmmbuild");
        let args: Vec<String> = build
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["--hand", "--amino", "out.hmm", "in.sto"]);

        let args: Vec<String> = tool
            .search_command(Path::new("out.hmm"), Path::new("hits.sto"))
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.windows(2).any(|w| w == ["-A", "hits.sto"]));
        assert!(args.windows(2).any(|w| w == ["--cpu", "2"]));
        assert!(args.last().unwrap().ends_with("pdb_seqres.txt"));
    }

    #[test]
    fn templates_take_coordinates_from_their_structure() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("mmcif")).unwrap();
        fs::write(dir.path().join("mmcif/1abc.cif"), CIF).unwrap();
        let tool = search(dir.path(), (2022, 1, 1));
        let hits = parse_hits(HITS, 4).unwrap();

        let mut structures = HashMap::new();
        let template = tool.align(&hits[0], &mut structures).unwrap();
        assert_eq!(template.sequence, ['M', 'K', '-', 'V']);
        assert_eq!(template.positions[0][0], [1.0, 0.0, 0.0]);
        assert_eq!(template.positions[0][1], [2.0, 0.0, 0.0]);
        assert_eq!(template.mask[0][1], 1.0);
        assert_eq!(template.mask[2], [0.0; ATOM_TYPE_NUM]);
        assert_eq!(template.positions[3][1], [4.0, 0.0, 0.0]);

        // No structure on disk for the second hit.
        assert!(tool.align(&hits[1], &mut structures).is_none());
    }

    #[test]
    fn templates_released_after_the_cutoff_are_dropped() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("mmcif")).unwrap();
        fs::write(dir.path().join("mmcif/1abc.cif"), CIF).unwrap();
        let tool = search(dir.path(), (1998, 12, 31));
        let hits = parse_hits(HITS, 4).unwrap();
        assert!(tool.align(&hits[0], &mut HashMap::new()).is_none());
    }

    #[test]
    fn the_query_own_entry_is_not_a_template() {
        let hit = TemplateHit {
            name: "1abc_A".into(),
            residues: "MKVL".chars().enumerate().map(|(i, c)| Some((c, i as i64 + 1))).collect(),
        };
        assert!(hit.duplicates("MKVL"));
        assert!(!hit.duplicates("MKVI"));
        let partial = TemplateHit {
            name: "1abc_A".into(),
            residues: vec![Some(('M', 1)), None, None, None],
        };
        assert!(!partial.duplicates("MKVL"));
    }

    #[test]
    fn missing_database_fails_before_launch() {
        let dir = tempdir().unwrap();
        let tool = search(dir.path(), (2022, 1, 1));
        let result = tool.search(&record("MKV"), &Msa::single("MKV", "q"), dir.path());
        assert!(matches!(result, Err(SearchError::MissingDatabase(_))));
    }
}
