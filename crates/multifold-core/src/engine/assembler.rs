use super::error::EngineError;
use super::planner::ChainPlan;
use crate::core::features::pairing::{ChainPlacement, PairingMode, merge_chains, pairing_ready};
use crate::core::models::features::{FeatureError, FeatureSet};
use crate::core::models::ids::ChainId;
use crate::core::models::sequence::Classification;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

fn invalid(e: FeatureError) -> EngineError {
    EngineError::MalformedInput(format!("chain features cannot be merged: {e}"))
}

/// Merges per-chain features into the features of the whole complex.
///
/// A single uniform chain is returned unchanged. Otherwise chains are merged in planner
/// order, so the result does not depend on the order in which chain features arrived.
#[instrument(skip_all, name = "assemble", fields(chains = plan.records.len()))]
pub fn assemble(
    plan: &ChainPlan,
    mut features: BTreeMap<ChainId, FeatureSet>,
) -> Result<FeatureSet, EngineError> {
    let take = |features: &mut BTreeMap<ChainId, FeatureSet>, id: ChainId| {
        features.remove(&id).ok_or_else(|| EngineError::MissingInput {
            chain_id: id,
            what: "chain features".to_string(),
        })
    };

    if let [only] = plan.records.as_slice() {
        if plan.classification == Classification::Uniform {
            debug!(chain = %only.id, "Single chain; features pass through unchanged");
            return take(&mut features, only.id);
        }
    }

    let mut entity_of: HashMap<&str, i64> = HashMap::new();
    let mut copies: HashMap<i64, i64> = HashMap::new();
    let mut ready = Vec::with_capacity(plan.records.len());
    let mut names = Vec::with_capacity(plan.records.len());

    for (index, record) in plan.records.iter().enumerate() {
        let next_entity = entity_of.len() as i64 + 1;
        let entity_id = *entity_of.entry(record.sequence.as_str()).or_insert(next_entity);
        let sym_id = {
            let count = copies.entry(entity_id).or_insert(0);
            *count += 1;
            *count
        };
        let placement = ChainPlacement {
            asym_id: index as i64 + 1,
            entity_id,
            sym_id,
        };
        let chain = take(&mut features, record.id)?;
        ready.push(pairing_ready(&chain, placement).map_err(invalid)?);
        names.push(record.id.to_string());
    }

    let mode = match plan.classification {
        Classification::Mixed => PairingMode::BySpecies,
        Classification::Uniform => PairingMode::QueryOnly,
    };
    let merged = merge_chains(&ready, &names, mode).map_err(invalid)?;
    info!(
        chains = names.len(),
        entities = entity_of.len(),
        ?mode,
        "Assembled complex features"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::template::empty_template_features;
    use crate::core::models::msa::Msa;
    use crate::core::models::sequence::SequenceRecord;
    use crate::engine::aggregator::{PrimarySearches, merge_base, paired_fields};
    use crate::engine::config::ModelPreset;
    use crate::engine::planner::plan;

    fn chain_features(record: &SequenceRecord, paired: bool) -> FeatureSet {
        let seq = &record.sequence;
        let searches = PrimarySearches {
            uniref90: Some(Msa::single(seq, "q")),
            mgnify: Some(Msa::single(seq, "q")),
            bfd: Some(Msa::single(seq, "q")),
        };
        let mut features =
            merge_base(record, &searches, Some(&empty_template_features(seq.len()))).unwrap();
        if paired {
            features.extend(paired_fields(&Msa::single(seq, "q")).unwrap());
        }
        features
    }

    fn features_for(plan: &ChainPlan, order: &[usize]) -> BTreeMap<ChainId, FeatureSet> {
        let mut map = BTreeMap::new();
        for &i in order {
            let record = &plan.records[i];
            map.insert(record.id, chain_features(record, true));
        }
        map
    }

    #[test]
    fn single_chain_passes_through_unchanged() {
        let plan = plan(">a\nMKV\n", ModelPreset::Monomer).unwrap();
        let record = &plan.records[0];
        let original = chain_features(record, false);
        let mut map = BTreeMap::new();
        map.insert(record.id, original.clone());
        assert_eq!(assemble(&plan, map).unwrap(), original);
    }

    #[test]
    fn heteromer_merge_concatenates_residues_in_planner_order() {
        let plan = plan(">a\nMKV\n>b\nGG\n", ModelPreset::Multimer).unwrap();
        let merged = assemble(&plan, features_for(&plan, &[0, 1])).unwrap();
        assert_eq!(merged.get("aatype").unwrap().shape(), &[5]);
        let asym = merged.get("asym_id").unwrap().as_int().unwrap();
        assert_eq!(asym, &[1, 1, 1, 2, 2]);
        let entity = merged.get("entity_id").unwrap().as_int().unwrap();
        assert_eq!(entity, &[1, 1, 1, 2, 2]);
    }

    #[test]
    fn homomer_copies_share_entity_with_increasing_sym_id() {
        let plan = plan(">a\nMK\n>b\nMK\n", ModelPreset::Multimer).unwrap();
        let merged = assemble(&plan, features_for(&plan, &[0, 1])).unwrap();
        let entity = merged.get("entity_id").unwrap().as_int().unwrap();
        let sym = merged.get("sym_id").unwrap().as_int().unwrap();
        assert_eq!(entity, &[1, 1, 1, 1]);
        assert_eq!(sym, &[1, 1, 2, 2]);
    }

    #[test]
    fn result_does_not_depend_on_arrival_order() {
        let plan = plan(">a\nMKV\n>b\nGG\n>c\nMKV\n", ModelPreset::Multimer).unwrap();
        let forward = assemble(&plan, features_for(&plan, &[0, 1, 2])).unwrap();
        let backward = assemble(&plan, features_for(&plan, &[2, 1, 0])).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn missing_chain_is_reported() {
        let plan = plan(">a\nMKV\n>b\nGG\n", ModelPreset::Multimer).unwrap();
        let result = assemble(&plan, features_for(&plan, &[0]));
        assert!(matches!(
            result,
            Err(EngineError::MissingInput { chain_id, .. }) if chain_id.to_string() == "B"
        ));
    }
}
