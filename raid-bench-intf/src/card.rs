// Copyright (c) Facebook, Inc. and its affiliates.
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::RaidType;
use rb_util::*;

const CARDS_DOC: &str = "\
//
// RAID card performance ceilings
//
// Each entry is either a flat profile which applies one random read cap
// to every RAID type plus random write caps for parity RAID
//
//  MODEL.randReadIOPS: Random read IOPS cap
//  MODEL.randWriteIOPS.RAIDn: Random write IOPS cap for RAID5/6
//
// or a per-RAID profile which caps every figure of the listed RAID types
//
//  MODEL.RAIDn.randReadIOPS: Random read IOPS cap
//  MODEL.RAIDn.randWriteIOPS: Random write IOPS cap
//  MODEL.RAIDn.seqReadBW: Sequential read bandwidth cap in MB/s
//  MODEL.RAIDn.seqWriteBW: Sequential write bandwidth cap in MB/s
//
// Per-RAID profiles are only used with formula version 2.0.
//
";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RaidLimits {
    #[serde(rename = "randReadIOPS")]
    pub rand_read_iops: f64,
    #[serde(rename = "randWriteIOPS")]
    pub rand_write_iops: f64,
    #[serde(rename = "seqReadBW")]
    pub seq_read_bw: f64,
    #[serde(rename = "seqWriteBW")]
    pub seq_write_bw: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CardProfile {
    Legacy {
        #[serde(rename = "randReadIOPS")]
        rand_read_iops: f64,
        #[serde(rename = "randWriteIOPS", default)]
        rand_write_iops: BTreeMap<RaidType, f64>,
    },
    PerRaid(BTreeMap<RaidType, RaidLimits>),
}

impl CardProfile {
    pub fn is_per_raid(&self) -> bool {
        match self {
            CardProfile::PerRaid(_) => true,
            CardProfile::Legacy { .. } => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardProfiles {
    pub cards: BTreeMap<String, CardProfile>,
}

fn legacy(read: f64, raid5_write: f64, raid6_write: f64) -> CardProfile {
    CardProfile::Legacy {
        rand_read_iops: read,
        rand_write_iops: [(RaidType::Raid5, raid5_write), (RaidType::Raid6, raid6_write)]
            .iter()
            .cloned()
            .collect(),
    }
}

fn per_raid(limits: &[(RaidType, [f64; 4])]) -> CardProfile {
    CardProfile::PerRaid(
        limits
            .iter()
            .map(|(rt, l)| {
                (
                    *rt,
                    RaidLimits {
                        rand_read_iops: l[0],
                        rand_write_iops: l[1],
                        seq_read_bw: l[2],
                        seq_write_bw: l[3],
                    },
                )
            })
            .collect(),
    )
}

impl Default for CardProfiles {
    fn default() -> Self {
        use RaidType::*;
        let mut cards = BTreeMap::new();

        cards.insert("SR1001".into(), legacy(6e6, 500e3, 400e3));
        cards.insert("SR1000".into(), legacy(16e6, 820e3, 500e3));
        cards.insert("SR1010".into(), legacy(22e6, 2e6, 1.5e6));
        cards.insert(
            "SR-CAM2".into(),
            per_raid(&[
                (Raid5, [10e6, 2.9e6, 140e3, 65e3]),
                (Raid6, [10e6, 2.3e6, 140e3, 60e3]),
                (Raid10, [10e6, 6e6, 140e3, 40e3]),
            ]),
        );
        cards.insert(
            "SR-PAM2".into(),
            per_raid(&[
                (Raid5, [22e6, 5e6, 280e3, 125e3]),
                (Raid6, [22e6, 4.5e6, 280e3, 120e3]),
                (Raid10, [18e6, 10e6, 280e3, 80e3]),
            ]),
        );
        cards.insert(
            "SR-UAD2".into(),
            per_raid(&[
                (Raid5, [30e6, 6e6, 280e3, 125e3]),
                (Raid6, [30e6, 5e6, 280e3, 120e3]),
                (Raid10, [22e6, 11e6, 280e3, 80e3]),
            ]),
        );

        Self { cards }
    }
}

impl JsonLoad for CardProfiles {}

impl JsonSave for CardProfiles {
    fn preamble() -> Option<String> {
        Some(CARDS_DOC.to_string())
    }
}

impl CardProfiles {
    /// Fallback model for formula 1.7 when a per-RAID card is selected.
    pub const LEGACY_DFL: &'static str = "SR1010";

    pub fn get(&self, model: &str) -> Option<&CardProfile> {
        self.cards.get(model)
    }

    /// Adds or replaces entries from `other`.
    pub fn extend(&mut self, other: CardProfiles) {
        self.cards.extend(other.cards);
    }

    pub fn models(&self) -> Vec<&str> {
        self.cards.keys().map(|k| k.as_str()).collect()
    }

    /// Every cap must be a non-negative number.
    pub fn verify(&self) -> Result<()> {
        for (model, profile) in self.cards.iter() {
            let caps: Vec<(String, f64)> = match profile {
                CardProfile::Legacy {
                    rand_read_iops,
                    rand_write_iops,
                } => std::iter::once(("randReadIOPS".to_string(), *rand_read_iops))
                    .chain(
                        rand_write_iops
                            .iter()
                            .map(|(rt, v)| (format!("randWriteIOPS.{}", rt), *v)),
                    )
                    .collect(),
                CardProfile::PerRaid(limits) => limits
                    .iter()
                    .flat_map(|(rt, l)| {
                        vec![
                            (format!("{}.randReadIOPS", rt), l.rand_read_iops),
                            (format!("{}.randWriteIOPS", rt), l.rand_write_iops),
                            (format!("{}.seqReadBW", rt), l.seq_read_bw),
                            (format!("{}.seqWriteBW", rt), l.seq_write_bw),
                        ]
                    })
                    .collect(),
            };
            for (name, v) in caps.iter() {
                if v.is_nan() || *v < 0.0 {
                    bail!("card {:?}: {} is {}, must be non-negative", model, name, v);
                }
            }
        }
        Ok(())
    }

    /// Loads an override file and rejects invalid caps.
    pub fn load_verified<P: AsRef<Path>>(path: P) -> Result<Self> {
        let cards = Self::load(path)?;
        cards.verify()?;
        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::{CardProfile, CardProfiles};
    use crate::RaidType;
    use rb_util::JsonLoad;

    #[test]
    fn test_builtin_cards() {
        let cards = CardProfiles::default();
        assert_eq!(cards.cards.len(), 6);
        assert!(!cards.get("SR1010").unwrap().is_per_raid());
        match cards.get("SR-PAM2").unwrap() {
            CardProfile::PerRaid(limits) => {
                assert_eq!(limits[&RaidType::Raid10].rand_read_iops, 18e6);
                assert!(limits.get(&RaidType::Raid0).is_none());
            }
            p => panic!("unexpected {:?}", p),
        }
    }

    #[test]
    fn test_card_file() {
        let mut cards = CardProfiles::default();
        let file = CardProfiles::load_str(
            r#"// site overrides
            {
                "SR1010": { "randReadIOPS": 20000000, "randWriteIOPS": { "RAID5": 1800000 } },
                "LAB-1": { "RAID5": { "randReadIOPS": 1e7, "randWriteIOPS": 1e6,
                                      "seqReadBW": 1e5, "seqWriteBW": 5e4 } }
            }"#,
        )
        .unwrap();
        cards.extend(file);

        assert_eq!(cards.cards.len(), 7);
        match cards.get("SR1010").unwrap() {
            CardProfile::Legacy {
                rand_read_iops,
                rand_write_iops,
            } => {
                assert_eq!(*rand_read_iops, 20e6);
                assert_eq!(rand_write_iops.get(&RaidType::Raid6), None);
            }
            p => panic!("unexpected {:?}", p),
        }
        assert!(cards.get("LAB-1").unwrap().is_per_raid());
        assert!(cards.verify().is_ok());
    }

    #[test]
    fn test_negative_caps_rejected() {
        assert!(CardProfiles::default().verify().is_ok());
        for input in &[
            r#"{ "X": { "randReadIOPS": -1 } }"#,
            r#"{ "X": { "randReadIOPS": 1e6, "randWriteIOPS": { "RAID6": -3 } } }"#,
            r#"{ "X": { "RAID10": { "randReadIOPS": 1e7, "randWriteIOPS": 1e6,
                                    "seqReadBW": 1e5, "seqWriteBW": -5 } } }"#,
        ] {
            let cards = CardProfiles::load_str(input).unwrap();
            assert!(cards.verify().is_err(), "{}", input);
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.json");
        std::fs::write(&path, r#"{ "X": { "randReadIOPS": -1 } }"#).unwrap();
        assert!(CardProfiles::load_verified(&path).is_err());
        std::fs::write(&path, r#"{ "X": { "randReadIOPS": 1 } }"#).unwrap();
        assert_eq!(CardProfiles::load_verified(&path).unwrap().models(), vec!["X"]);
    }
}
