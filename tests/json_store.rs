#![cfg(feature = "json-codec")]
mod util;

use mesh_exodus::prelude::*;
use std::fs;
use std::path::PathBuf;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mesh-exodus-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("scratch directory");
    dir.join(name)
}

#[test]
fn json_files_round_trip() {
    let path = scratch("strip.exo.json");
    let codec = JsonCodec::json();
    let original = util::strip_mesh();
    original.write(&codec, &path).expect("write json");
    assert!(path.is_file());

    let db = MeshDatabase::open(&codec, &path).expect("open json");
    assert_eq!(db.blocks(), original.blocks());
    assert_eq!(db.element_value(1, "stress", 0).expect("stress of element 0"), 209.0);
    assert_eq!(db.global_data(1).expect("globals at step 1"), &[15.0]);
    fs::remove_file(&path).expect("remove json");
}

#[test]
fn no_staging_file_is_left_behind() {
    let path = scratch("staged.exo.json");
    util::triangle_mesh()
        .write(&JsonCodec::json(), &path)
        .expect("write json");
    let mut staging = path.clone().into_os_string();
    staging.push(".partial");
    assert!(!PathBuf::from(staging).exists());
    fs::remove_file(&path).expect("remove json");
}

#[test]
fn missing_json_file_is_not_found() {
    let err = MeshDatabase::read(&JsonCodec::json(), scratch("absent.exo.json")).unwrap_err();
    assert!(matches!(err, MeshError::Codec(CodecError::FileNotFound(_))));
}
