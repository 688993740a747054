// Copyright (c) Facebook, Inc. and its affiliates.
use raid_bench_intf::{ClassifierConfig, DeviceClass, Stage, VD_PREFIXES};

fn all_digits(s: &str) -> bool {
    s.len() > 0 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Matches NVMe namespace names, `nvme<N>n<M>`.
pub fn is_nvme_namespace(dev: &str) -> bool {
    let rest = match dev.strip_prefix("nvme") {
        Some(v) => v,
        None => return false,
    };
    match rest.find('n') {
        Some(pos) => all_digits(&rest[..pos]) && all_digits(&rest[pos + 1..]),
        None => false,
    }
}

/// Matches md raid devices, `md<N>`.
pub fn is_md(dev: &str) -> bool {
    match dev.strip_prefix("md") {
        Some(rest) => all_digits(rest),
        None => false,
    }
}

fn is_pd(dev: &str, cfg: &ClassifierConfig) -> bool {
    is_nvme_namespace(dev)
        && (cfg.nvme_allow_list.is_empty()
            || cfg.nvme_allow_list.iter().any(|d| device_name(d) == dev))
}

fn is_vd(dev: &str, cfg: &ClassifierConfig) -> bool {
    (cfg.vd_name.len() > 0 && dev.contains(cfg.vd_name.as_str()))
        || is_md(dev)
        || VD_PREFIXES.iter().any(|pfx| dev.starts_with(pfx))
}

/// Kernel device name, with any `/dev/` prefix dropped.
pub fn device_name(device: &str) -> &str {
    let dev = device.trim();
    dev.strip_prefix("/dev/").unwrap_or(dev)
}

/// Decides whether samples of `device` belong to the run in `stage`.
pub fn classify(device: &str, stage: Stage, cfg: &ClassifierConfig) -> DeviceClass {
    let dev = device_name(device);

    match stage {
        Stage::Pd => {
            if is_pd(dev, cfg) {
                return DeviceClass::PhysicalDrive;
            }
        }
        Stage::Vd => {
            if is_vd(dev, cfg) {
                return DeviceClass::VirtualDrive;
            }
        }
        Stage::Init | Stage::None => {
            if cfg.run_pd && is_pd(dev, cfg) {
                return DeviceClass::PhysicalDrive;
            }
            if cfg.run_vd && is_vd(dev, cfg) {
                return DeviceClass::VirtualDrive;
            }
            // An explicit device list admits its members before the run
            // switches are known.
            if !cfg.run_pd
                && !cfg.run_vd
                && cfg.nvme_allow_list.len() > 0
                && is_pd(dev, cfg)
            {
                return DeviceClass::PhysicalDrive;
            }
        }
    }
    DeviceClass::Unknown
}

#[cfg(test)]
mod tests {
    use super::{classify, is_md, is_nvme_namespace};
    use raid_bench_intf::{ClassifierConfig, DeviceClass, Stage};

    use DeviceClass::*;

    fn cfg(allow: &[&str], vd_name: &str, run_pd: bool, run_vd: bool) -> ClassifierConfig {
        ClassifierConfig {
            vd_name: vd_name.into(),
            nvme_allow_list: allow.iter().map(|s| s.to_string()).collect(),
            run_pd,
            run_vd,
        }
    }

    #[test]
    fn test_patterns() {
        for pair in &[
            ("nvme0n1", true),
            ("nvme12n3", true),
            ("nvme0", false),
            ("nvme0n", false),
            ("nvme0n1p1", false),
            ("nvmen1", false),
            ("sda", false),
        ] {
            assert_eq!(is_nvme_namespace(pair.0), pair.1, "{}", pair.0);
        }
        assert!(is_md("md127"));
        assert!(!is_md("md"));
        assert!(!is_md("mdx1"));
    }

    #[test]
    fn test_pd_stage() {
        let any = cfg(&[], "", false, false);
        let listed = cfg(&["nvme0n1", "nvme1n1"], "", false, false);

        assert_eq!(classify("nvme3n1", Stage::Pd, &any), PhysicalDrive);
        assert_eq!(classify("/dev/nvme3n1", Stage::Pd, &any), PhysicalDrive);
        assert_eq!(classify("nvme3n1", Stage::Pd, &listed), Unknown);
        assert_eq!(classify("nvme1n1", Stage::Pd, &listed), PhysicalDrive);
        assert_eq!(classify("gdg0n1", Stage::Pd, &any), Unknown);

        let dev_paths = cfg(&["/dev/nvme2n1"], "", false, false);
        assert_eq!(classify("nvme2n1", Stage::Pd, &dev_paths), PhysicalDrive);
        assert_eq!(classify("/dev/nvme2n1", Stage::Pd, &dev_paths), PhysicalDrive);
        assert_eq!(classify("nvme0n1", Stage::Pd, &dev_paths), Unknown);
    }

    #[test]
    fn test_vd_stage() {
        let c = cfg(&[], "raidvol", false, false);

        assert_eq!(classify("raidvol", Stage::Vd, &c), VirtualDrive);
        assert_eq!(classify("dm-raidvol-0", Stage::Vd, &c), VirtualDrive);
        assert_eq!(classify("md0", Stage::Vd, &c), VirtualDrive);
        assert_eq!(classify("gdg0n1", Stage::Vd, &c), VirtualDrive);
        assert_eq!(classify("gvo1n2", Stage::Vd, &c), VirtualDrive);
        assert_eq!(classify("nvme0n1", Stage::Vd, &c), Unknown);
        assert_eq!(classify("sdb", Stage::Vd, &cfg(&[], "", false, false)), Unknown);
    }

    #[test]
    fn test_idle_stages() {
        for stage in &[Stage::Init, Stage::None] {
            let off = cfg(&[], "", false, false);
            assert_eq!(classify("nvme0n1", *stage, &off), Unknown);
            assert_eq!(classify("md0", *stage, &off), Unknown);

            let pd = cfg(&[], "", true, false);
            assert_eq!(classify("nvme0n1", *stage, &pd), PhysicalDrive);
            assert_eq!(classify("md0", *stage, &pd), Unknown);

            let both = cfg(&[], "", true, true);
            assert_eq!(classify("nvme0n1", *stage, &both), PhysicalDrive);
            assert_eq!(classify("gdg0n1", *stage, &both), VirtualDrive);

            let listed = cfg(&["nvme0n1"], "", false, false);
            assert_eq!(classify("nvme0n1", *stage, &listed), PhysicalDrive);
            assert_eq!(classify("nvme1n1", *stage, &listed), Unknown);
        }
    }
}
