use std::io::Cursor;

use proptest::prelude::*;
use uuid::Uuid;

use crate::{
    BtpBuilder, BtpError, BtpPackage, Compression, MemoryMipSource, MipDescriptor, MipEntry,
    MipStorage, PixelFormat, ReadOptions, TextureEntry, TextureOverride, TfcReference, BTP_MAGIC,
};

const DLC_GUID: Uuid = Uuid::from_u128(0x6f1e_0c2a_44d1_4b8e_9a55_0d3c_71e2_f001);
const OTHER_GUID: Uuid = Uuid::from_u128(0x0bad_0bad_0bad_0bad_0bad_0bad_0bad_0bad);

/// Offset of the first entry's `tfc_index` field.
const FIRST_ENTRY_TFC_INDEX: usize = 32 + 512;

/// Offset of the first entry's first mip slot.
const FIRST_ENTRY_MIPS: usize = FIRST_ENTRY_TFC_INDEX + 12;

fn compile(builder: &BtpBuilder, source: MemoryMipSource) -> (Vec<u8>, crate::CompileReport) {
    let mut cursor = Cursor::new(Vec::new());
    let report = builder
        .build_to_writer(&mut cursor, source)
        .expect("Failed to build package");
    (cursor.into_inner(), report)
}

fn tex_a() -> (BtpBuilder, MemoryMipSource) {
    let builder = BtpBuilder::default()
        .with_compression(Compression::None)
        .with_texture(
            TextureOverride::new("Tex.A", PixelFormat::DXT5)
                .with_mip(MipDescriptor::package(64, 64, 4096))
                .with_mip(MipDescriptor::package(32, 32, 1024)),
        );
    let source = MemoryMipSource::new()
        .with_mip("Tex.A", 0, vec![0xA0; 4096])
        .with_mip("Tex.A", 1, vec![0xA1; 1024]);
    (builder, source)
}

#[test]
fn test_tex_a_layout() {
    let (builder, source) = tex_a();
    let (bytes, report) = compile(&builder, source);

    // header + 1 entry, 5120 bytes of mips, then the TFC table aligned to 16
    assert_eq!(report.tfc_table_offset, 6000);
    assert_eq!(report.file_size, 6144);
    assert_eq!(bytes.len(), 6144);
    assert_eq!(&bytes[..6], &BTP_MAGIC);

    let mut package = BtpPackage::mount_from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(package.header().texture_count, 1);
    assert_eq!(package.header().tfc_table_count, 1);
    assert!(package.tfc_table()[0].is_sentinel());

    let entry = &package.entries()[0];
    assert_eq!(entry.path, "Tex.A");
    assert_eq!(entry.format, PixelFormat::DXT5);
    assert_eq!(entry.tfc_index, 0);
    assert_eq!(entry.populated_mip_count, 2);
    assert_eq!(entry.mips[0].data_offset, 868);
    assert_eq!(entry.mips[1].data_offset, 868 + 4096);
    assert!(entry.mips[2..].iter().all(|mip| *mip == MipEntry::default()));

    let read_back = &package.texture_overrides()[0];
    assert_eq!(read_back.mips[0], MipDescriptor::package(64, 64, 4096));
    assert_eq!(read_back.mips[1], MipDescriptor::package(32, 32, 1024));

    assert_eq!(&package.load_mip(0, 0).unwrap()[..], &[0xA0; 4096][..]);
    assert_eq!(&package.load_mip(0, 1).unwrap()[..], &[0xA1; 1024][..]);
}

#[test]
fn test_unpopulated_slots_are_zero_on_disk() {
    let (builder, source) = tex_a();
    let (bytes, _) = compile(&builder, source);

    let unused = FIRST_ENTRY_MIPS + 2 * MipEntry::size_of()..32 + TextureEntry::size_of();
    assert_eq!(unused.len(), 11 * MipEntry::size_of());
    assert!(bytes[unused].iter().all(|&b| b == 0));
}

#[test]
fn test_shared_tfc_gets_one_index() {
    let texture = |path: &str| {
        TextureOverride::new(path, PixelFormat::DXT1)
            .with_tfc(TfcReference::new("Textures_DLC", DLC_GUID))
            .with_mip(MipDescriptor::external(256, 256, 32768, 0x1000, 32768))
            .with_mip(MipDescriptor::package(128, 128, 8192))
    };
    let builder = BtpBuilder::default()
        .with_texture(texture("Tex.A"))
        .with_texture(texture("Tex.B"));
    let source = MemoryMipSource::new()
        .with_mip("Tex.A", 1, vec![1; 8192])
        .with_mip("Tex.B", 1, vec![2; 8192]);
    let (bytes, report) = compile(&builder, source);

    assert_eq!(report.tfc_table_count, 2);
    assert_eq!(report.external_mips, 2);
    assert_eq!(report.package_mips, 2);

    let mut package = BtpPackage::mount_from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(package.tfc_table().len(), 2);
    assert_eq!(package.tfc_table()[1].name, "Textures_DLC");
    assert_eq!(package.tfc_table()[1].guid, DLC_GUID);
    assert!(package.entries().iter().all(|entry| entry.tfc_index == 1));

    let overrides = package.texture_overrides();
    assert_eq!(
        overrides[0].tfc,
        Some(TfcReference::new("Textures_DLC", DLC_GUID))
    );
    assert_eq!(overrides[0].mips[0], texture("Tex.A").mips[0]);

    assert!(matches!(
        package.load_mip(0, 0),
        Err(BtpError::ExternalMip {
            texture_index: 0,
            mip_index: 0
        })
    ));
    assert_eq!(&package.load_mip(1, 1).unwrap()[..], &[2; 8192][..]);
    assert_eq!(package.verify().unwrap(), 2);
}

#[test]
fn test_guid_mismatch_keeps_first_guid() {
    let texture = |path: &str, guid: Uuid| {
        TextureOverride::new(path, PixelFormat::DXT1)
            .with_tfc(TfcReference::new("Textures_DLC", guid))
            .with_mip(MipDescriptor::external(64, 64, 2048, 0x800, 2048))
    };
    let builder = BtpBuilder::default()
        .with_texture(texture("Tex.A", DLC_GUID))
        .with_texture(texture("Tex.B", OTHER_GUID));
    let (bytes, report) = compile(&builder, MemoryMipSource::new());

    assert_eq!(report.tfc_guid_mismatches, 1);
    assert_eq!(report.tfc_table_count, 2);

    let package = BtpPackage::mount_from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(package.tfc_entry(1).map(|tfc| tfc.guid), Some(DLC_GUID));
    assert_eq!(package.entries()[1].tfc_index, 1);
}

#[test]
fn test_identical_payloads_are_stored_once() {
    for compression in [Compression::None, Compression::default()] {
        let builder = BtpBuilder::default()
            .with_compression(compression)
            .with_texture(
                TextureOverride::new("Tex.A", PixelFormat::DXT5)
                    .with_mip(MipDescriptor::package(32, 32, 1024)),
            )
            .with_texture(
                TextureOverride::new("Tex.B", PixelFormat::DXT5)
                    .with_mip(MipDescriptor::package(32, 32, 1024)),
            );
        let payload: Vec<u8> = (0..1024).map(|i| (i % 251) as u8).collect();
        let source = MemoryMipSource::new()
            .with_mip("Tex.A", 0, payload.clone())
            .with_mip("Tex.B", 0, payload.clone());
        let (bytes, report) = compile(&builder, source);

        let mut package = BtpPackage::mount_from_reader(Cursor::new(bytes)).unwrap();
        let (a, b) = (package.entries()[0].mips[0], package.entries()[1].mips[0]);
        assert_eq!(a.data_offset, b.data_offset);
        assert_eq!(a.compressed_size, b.compressed_size);

        assert_eq!(report.dedup.deduplicated_mips, 1);
        assert_eq!(report.dedup.saved_bytes, u64::from(a.compressed_size));
        assert_eq!(report.dedup.output_bytes, u64::from(a.compressed_size));

        // data segment holds exactly one copy
        let data_start = 32 + 2 * TextureEntry::size_of() as u64;
        assert_eq!(a.data_offset, data_start);
        assert!(report.tfc_table_offset - data_start < 2 * u64::from(a.compressed_size));

        assert_eq!(&package.load_mip(1, 0).unwrap()[..], &payload[..]);
    }
}

#[test]
fn test_oversize_tfc_name_aborts() {
    let builder = BtpBuilder::default().with_texture(
        TextureOverride::new("Tex.A", PixelFormat::DXT1)
            .with_tfc(TfcReference::new("T".repeat(64), DLC_GUID))
            .with_mip(MipDescriptor::external(64, 64, 2048, 0x800, 2048)),
    );
    let result = builder.build_to_writer(&mut Cursor::new(Vec::new()), MemoryMipSource::new());
    assert!(matches!(
        result,
        Err(BtpError::NameTooLong { len: 64, max: 63, .. })
    ));
}

#[test]
fn test_reader_rejects_dangling_tfc_index() {
    let (builder, source) = tex_a();
    let (mut bytes, _) = compile(&builder, source);
    bytes[FIRST_ENTRY_TFC_INDEX..FIRST_ENTRY_TFC_INDEX + 4].copy_from_slice(&5i32.to_le_bytes());

    assert!(matches!(
        BtpPackage::mount_from_reader(Cursor::new(bytes)),
        Err(BtpError::DanglingTfcReference {
            texture_index: 0,
            index: 5,
            count: 1
        })
    ));
}

#[test]
fn test_reader_rejects_corrupt_payload() {
    let (builder, source) = tex_a();
    let (mut bytes, _) = compile(&builder, source);
    // claim one byte more than was stored
    bytes[FIRST_ENTRY_MIPS..FIRST_ENTRY_MIPS + 4].copy_from_slice(&4097u32.to_le_bytes());

    let mut package = BtpPackage::mount_from_reader(Cursor::new(bytes.clone())).unwrap();
    assert!(matches!(
        package.load_mip(0, 0),
        Err(BtpError::CorruptPayload {
            texture_index: 0,
            mip_index: 0,
            expected: 4097,
            actual: 4096
        })
    ));
    assert!(package.verify().is_err());

    let eager = BtpPackage::open(
        Cursor::new(bytes),
        ReadOptions {
            load_payloads: true,
        },
    );
    assert!(matches!(eager, Err(BtpError::CorruptPayload { .. })));
}

#[test]
fn test_reader_rejects_payload_outside_data_segment() {
    let (builder, source) = tex_a();
    let (mut bytes, _) = compile(&builder, source);
    let offset = FIRST_ENTRY_MIPS + 8;
    bytes[offset..offset + 8].copy_from_slice(&5990u64.to_le_bytes());

    let mut package = BtpPackage::mount_from_reader(Cursor::new(bytes)).unwrap();
    assert!(matches!(package.load_mip(0, 0), Err(BtpError::Malformed(_))));
}

#[test]
fn test_reader_rejects_overflowing_payload_offset() {
    let (builder, source) = tex_a();
    let (mut bytes, _) = compile(&builder, source);
    let offset = FIRST_ENTRY_MIPS + 8;
    bytes[offset..offset + 8].copy_from_slice(&(u64::MAX - 4).to_le_bytes());

    let mut package = BtpPackage::mount_from_reader(Cursor::new(bytes)).unwrap();
    assert!(matches!(package.load_mip(0, 0), Err(BtpError::Malformed(_))));
    assert!(matches!(package.load_mip_raw(0, 0), Err(BtpError::Malformed(_))));
}

#[test]
fn test_reader_rejects_truncated_compressed_payload() {
    let payload: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 256) as u8).collect();
    let builder = BtpBuilder::default().with_texture(
        TextureOverride::new("Tex.A", PixelFormat::DXT5)
            .with_mip(MipDescriptor::package(64, 64, 4096)),
    );
    let (mut bytes, _) = compile(&builder, MemoryMipSource::new().with_mip("Tex.A", 0, payload));

    let size_field = FIRST_ENTRY_MIPS + 4;
    let stored = u32::from_le_bytes(bytes[size_field..size_field + 4].try_into().unwrap());
    bytes[size_field..size_field + 4].copy_from_slice(&(stored - 4).to_le_bytes());

    let mut package = BtpPackage::mount_from_reader(Cursor::new(bytes)).unwrap();
    assert!(package.entries()[0].mips[0].is_compressed());
    assert!(matches!(
        package.load_mip(0, 0),
        Err(BtpError::CorruptPayload {
            texture_index: 0,
            mip_index: 0,
            expected: 4096,
            ..
        })
    ));
}

#[test]
fn test_reader_rejects_missing_sentinel() {
    let (builder, source) = tex_a();
    let (mut bytes, _) = compile(&builder, source);
    bytes[6000] = b'X';

    assert!(matches!(
        BtpPackage::mount_from_reader(Cursor::new(bytes)),
        Err(BtpError::Malformed(_))
    ));
}

#[test]
fn test_reader_rejects_truncated_file() {
    let (builder, source) = tex_a();
    let (mut bytes, _) = compile(&builder, source);
    bytes.truncate(6100);

    assert!(BtpPackage::mount_from_reader(Cursor::new(bytes)).is_err());
}

/// A texture and, per mip, the payload of package mips (`None` for external mips).
type TexturePlan = (TextureOverride, Vec<Option<Vec<u8>>>);

fn tfc_strategy() -> impl Strategy<Value = Option<TfcReference>> {
    prop_oneof![
        Just(None),
        Just(Some(TfcReference::new("Textures_DLC", DLC_GUID))),
        Just(Some(TfcReference::new("Textures_Base", OTHER_GUID))),
    ]
}

fn mip_strategy() -> impl Strategy<Value = (MipDescriptor, Vec<u8>, bool)> {
    (
        1..=2048u16,
        1..=2048u16,
        prop::collection::vec(any::<u8>(), 1..256),
        1..=(1u64 << 40),
        1..=(1u32 << 20),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(width, height, payload, offset, compressed_size, unmodified, external)| {
                let uncompressed_size = payload.len() as u32;
                let external_mip = MipDescriptor {
                    width,
                    height,
                    uncompressed_size,
                    storage: MipStorage::External {
                        offset,
                        compressed_size,
                        compressed: compressed_size != uncompressed_size,
                        unmodified,
                    },
                };
                let mip = if external {
                    external_mip
                } else {
                    MipDescriptor::package(width, height, uncompressed_size)
                };
                (mip, payload, external)
            },
        )
}

fn texture_strategy() -> impl Strategy<Value = TexturePlan> {
    (
        "[A-Za-z_][A-Za-z0-9_.]{0,40}",
        prop_oneof![
            Just(PixelFormat::DXT1),
            Just(PixelFormat::DXT5),
            Just(PixelFormat::A8R8G8B8)
        ],
        any::<bool>(),
        any::<u8>(),
        any::<bool>(),
        tfc_strategy(),
        prop::collection::vec(mip_strategy(), 1..=crate::MAX_MIPS),
    )
        .prop_map(|(path, format, srgb, lod_bias, never_stream, tfc, mips)| {
            let mut texture = TextureOverride::new(path, format)
                .with_srgb(srgb)
                .with_lod_bias(lod_bias)
                .with_never_stream(never_stream);
            let has_tfc = tfc.is_some();
            texture.tfc = tfc;

            let mut payloads = Vec::with_capacity(mips.len());
            for (mip, payload, external) in mips {
                if external && has_tfc {
                    texture = texture.with_mip(mip);
                    payloads.push(None);
                } else {
                    texture = texture.with_mip(MipDescriptor::package(
                        mip.width,
                        mip.height,
                        mip.uncompressed_size,
                    ));
                    payloads.push(Some(payload));
                }
            }
            (texture, payloads)
        })
}

fn package_strategy() -> impl Strategy<Value = Vec<TexturePlan>> {
    prop::collection::vec(texture_strategy(), 1..=3).prop_map(|plans| {
        plans
            .into_iter()
            .enumerate()
            .map(|(index, (mut texture, payloads))| {
                texture.path = format!("T{index}.{}", texture.path);
                (texture, payloads)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn test_logical_roundtrip(plans in package_strategy(), zstd in any::<bool>()) {
        let compression = if zstd { Compression::default() } else { Compression::None };
        let mut source = MemoryMipSource::new();
        for (texture, payloads) in &plans {
            for (mip_index, payload) in payloads.iter().enumerate() {
                if let Some(payload) = payload {
                    source.insert(texture.path.clone(), mip_index, payload.clone());
                }
            }
        }
        let textures: Vec<TextureOverride> =
            plans.iter().map(|(texture, _)| texture.clone()).collect();

        let builder = BtpBuilder::default()
            .with_compression(compression)
            .with_textures(textures.clone());
        let (bytes, report) = compile(&builder, source);
        prop_assert_eq!(report.file_size as usize, bytes.len());
        prop_assert_eq!(report.tfc_guid_mismatches, 0);

        let mut package = BtpPackage::mount_from_reader(Cursor::new(bytes)).unwrap();
        prop_assert_eq!(package.texture_overrides(), textures);

        let mut package_mips = 0;
        for (texture_index, (_, payloads)) in plans.iter().enumerate() {
            for (mip_index, payload) in payloads.iter().enumerate() {
                if let Some(payload) = payload {
                    let loaded = package.load_mip(texture_index, mip_index).unwrap();
                    prop_assert_eq!(&loaded[..], &payload[..]);
                    package_mips += 1;
                }
            }
        }
        prop_assert_eq!(package.verify().unwrap(), package_mips);
    }
}
