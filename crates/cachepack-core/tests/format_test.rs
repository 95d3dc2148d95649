use cachepack_core::archive::{from_format, Format, Options};
use cachepack_core::{Error, GzipArchive, TarArchive, ZstdArchive};
use cachepack_core::Archive;
use cachepack_testing::assertions::assert_trees_equal;
use cachepack_testing::fixtures::{create_cache_tree, CACHE_TREE_BYTES};
use cachepack_testing::TestDir;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor, Write};

#[test]
fn test_every_format_round_trips() {
    let src = TestDir::new().unwrap();
    create_cache_tree(&src).unwrap();

    for format in [Format::Tar, Format::Gzip, Format::Zstd] {
        let archive = from_format(format, src.path(), Options::default());
        let mut buf = Vec::new();
        let created = archive.create(&[src.join("cache")], &mut buf).unwrap();

        let dst = TestDir::new().unwrap();
        let extracted = archive.extract(dst.path(), &mut Cursor::new(&buf)).unwrap();

        assert_eq!(created, CACHE_TREE_BYTES, "{}", format);
        assert_eq!(extracted, CACHE_TREE_BYTES, "{}", format);
        assert_trees_equal(&src.join("cache"), &dst.join("cache")).unwrap();
    }
}

#[test]
fn test_compressed_formats_are_smaller_than_tar() {
    let src = TestDir::new().unwrap();
    create_cache_tree(&src).unwrap();
    let srcs = [src.join("cache")];

    let mut plain = Vec::new();
    TarArchive::new(src.path(), false)
        .create(&srcs, &mut plain)
        .unwrap();

    let mut gz = Vec::new();
    GzipArchive::new(src.path(), false, 9)
        .create(&srcs, &mut gz)
        .unwrap();

    let mut zst = Vec::new();
    ZstdArchive::new(src.path(), false, 9)
        .create(&srcs, &mut zst)
        .unwrap();

    assert!(gz.len() < plain.len() / 10);
    assert!(zst.len() < plain.len() / 10);
    assert_eq!(&gz[..2], &[0x1F, 0x8B]);
}

#[test]
fn test_gzip_rejects_headerless_input() {
    let dst = TestDir::new().unwrap();
    let err = GzipArchive::new(".", false, -1)
        .extract(dst.path(), &mut Cursor::new(vec![0u8; 1024]))
        .unwrap_err();

    assert!(matches!(err, Error::DecoderConstruction(_)));
    assert_eq!(err.bytes_written(), 0);
}

#[test]
fn test_stream_through_files() {
    let src = TestDir::new().unwrap();
    create_cache_tree(&src).unwrap();
    let work = TestDir::new().unwrap();
    let archive_path = work.join(&format!("cache.{}", Format::Zstd.extension()));

    let archive = from_format(
        Format::from_path(&archive_path).unwrap(),
        src.path(),
        Options {
            compression_level: 3,
            skip_symlinks: false,
        },
    );

    {
        let mut out = BufWriter::new(File::create(&archive_path).unwrap());
        archive.create(&[src.join("cache")], &mut out).unwrap();
        out.flush().unwrap();
    }
    assert!(fs::metadata(&archive_path).unwrap().len() > 0);

    let dst = work.join("restored");
    let mut input = BufReader::new(File::open(&archive_path).unwrap());
    archive.extract(&dst, &mut input).unwrap();

    assert_trees_equal(&src.join("cache"), &dst.join("cache")).unwrap();
}

#[test]
fn test_extract_over_existing_tree() {
    let src = TestDir::new().unwrap();
    create_cache_tree(&src).unwrap();

    let archive = ZstdArchive::new(src.path(), false, -1);
    let mut buf = Vec::new();
    archive.create(&[src.join("cache")], &mut buf).unwrap();

    let dst = TestDir::new().unwrap();
    dst.create_file("cache/lib/index.js", b"stale").unwrap();
    dst.create_file("cache/untracked.txt", b"left alone").unwrap();

    archive.extract(dst.path(), &mut Cursor::new(&buf)).unwrap();

    assert_eq!(
        fs::read(dst.join("cache/lib/index.js")).unwrap(),
        b"module.exports = 42;\n"
    );
    assert_eq!(
        fs::read(dst.join("cache/untracked.txt")).unwrap(),
        b"left alone"
    );
}

#[cfg(unix)]
#[test]
fn test_file_permissions_are_restored() {
    use cachepack_testing::assertions::assert_file_permissions;
    use std::os::unix::fs::PermissionsExt;

    let src = TestDir::new().unwrap();
    let script = src.create_file("bin/run.sh", b"#!/bin/sh\necho hi\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let archive = GzipArchive::new(src.path(), false, -1);
    let mut buf = Vec::new();
    archive.create(&[src.join("bin")], &mut buf).unwrap();

    let dst = TestDir::new().unwrap();
    archive.extract(dst.path(), &mut Cursor::new(&buf)).unwrap();

    assert_file_permissions(&dst.join("bin/run.sh"), 0o755).unwrap();
}
