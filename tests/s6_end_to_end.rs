//! End-to-end scenario: a BFS run that exits cleanly after its single
//! requested iteration over a tiny, hand-built on-disk corpus (spec §8, S6).

mod common;

use common::{push_u16, push_u32, push_u64};
use tilegraph::config::{Config, GlobalFetcherMode, LocalFetcherMode, LocalReducerMode, TileProcessorInputMode, TileProcessorMode, TileProcessorOutputMode};
use tilegraph::kernels::{bfs::UNREACHED, AlgorithmKind};
use tilegraph::runtime::Runtime;

/// Writes the minimal corpus for a 4-vertex, edgeless graph: one empty tile
/// plus the global metadata every `BlockFetch` read touches. Original ids
/// are deliberately not `0..3` (spec's S6 uses source id `100` on a
/// 4-vertex graph), exercising `global-to-orig.dat`'s reverse lookup.
fn write_corpus(tile_dir: &std::path::Path, globals_dir: &std::path::Path) {
    std::fs::create_dir_all(tile_dir).unwrap();
    std::fs::create_dir_all(globals_dir).unwrap();

    // tile-stat-0.dat: {block_id:u64, count_edges:u32, count_vertex_src:u16,
    // count_vertex_tgt:u16, flags:u8}, zero edges, no RLE, no weights.
    let mut stat = Vec::new();
    push_u64(&mut stat, 0);
    push_u32(&mut stat, 0);
    push_u16(&mut stat, 0);
    push_u16(&mut stat, 0);
    stat.push(0);
    std::fs::write(tile_dir.join("tile-stat-0.dat"), stat).unwrap();

    // tile-0.dat: {offset_src:u64, offset_tgt:u64, offset_weight:u64}, no
    // edges so the offsets are never dereferenced.
    let mut data = Vec::new();
    push_u64(&mut data, 24);
    push_u64(&mut data, 24);
    push_u64(&mut data, 0);
    std::fs::write(tile_dir.join("tile-0.dat"), data).unwrap();

    // tile-index-0.dat: header only, zero src/tgt vertices.
    let mut idx = Vec::new();
    push_u64(&mut idx, 0); // block_id
    push_u32(&mut idx, 0); // count_src_vertices
    push_u32(&mut idx, 0); // count_tgt_vertices
    push_u64(&mut idx, 48); // offset_src_index
    push_u64(&mut idx, 48); // offset_tgt_index
    push_u64(&mut idx, 48); // offset_src_index_bit_extension
    push_u64(&mut idx, 48); // offset_tgt_index_bit_extension
    std::fs::write(tile_dir.join("tile-index-0.dat"), idx).unwrap();

    // global-stats.dat
    let mut stats = Vec::new();
    push_u64(&mut stats, 4); // count_vertices
    push_u64(&mut stats, 1); // count_tiles
    stats.push(0); // is_weighted_graph
    stats.push(1); // is_index_32_bits
    std::fs::write(globals_dir.join("global-stats.dat"), stats).unwrap();

    // vertex-degrees.dat: 4 vertices, all-zero degrees.
    std::fs::write(globals_dir.join("vertex-degrees.dat"), vec![0u8; 4 * 8]).unwrap();

    // global-to-orig.dat: {global_id, original_id} pairs, 32-bit fields.
    // Original ids intentionally not 0..3, per S6's source id 100.
    let mut g2o = Vec::new();
    for (global_id, original_id) in [(0u32, 100u32), (1, 200), (2, 300), (3, 400)] {
        push_u32(&mut g2o, global_id);
        push_u32(&mut g2o, original_id);
    }
    std::fs::write(globals_dir.join("global-to-orig.dat"), g2o).unwrap();

    // Selective scheduling is off in this test, so the inverted index can be
    // empty for every vertex.
    std::fs::write(globals_dir.join("vertex-to-tile-count.dat"), vec![0u8; 4 * 4]).unwrap();
    std::fs::write(globals_dir.join("vertex-to-tile-index.dat"), Vec::<u8>::new()).unwrap();
}

fn base_config(tile_dir: &std::path::Path, globals_dir: &std::path::Path) -> Config {
    Config {
        algorithm: AlgorithmKind::Bfs,
        max_iterations: 1,
        nmic: 1,
        count_applier: 1,
        count_globalreducer: 1,
        count_globalfetcher: 1,
        count_indexreader: 1,
        count_vertex_reducer: 1,
        count_vertex_fetcher: 1,
        count_tile_processors: 1,
        count_followers: 1,
        count_tile_reader: 1,
        in_memory_mode: 1,
        paths_meta: globals_dir.to_string_lossy().into_owned(),
        paths_tile: tile_dir.to_string_lossy().into_owned(),
        path_globals: globals_dir.to_path_buf(),
        use_selective_scheduling: 0,
        enable_tile_partitioning: 0,
        enable_fault_tolerance: 0,
        path_fault_tolerance_output: None,
        local_fetcher_mode: LocalFetcherMode::DirectAccess,
        global_fetcher_mode: GlobalFetcherMode::Active,
        local_reducer_mode: LocalReducerMode::Locking,
        tile_processor_mode: TileProcessorMode::Active,
        tile_processor_input_mode: TileProcessorInputMode::VertexFetcher,
        tile_processor_output_mode: TileProcessorOutputMode::VertexReducer,
        host_tiles_rb_size: 4,
        processed_rb_size: 4,
        read_tiles_rb_size: 4,
        use_smt: 0,
        log: None,
        source_vertex: Some(100),
        seed: 0,
    }
}

#[test]
fn s6_bfs_single_iteration_shuts_down_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let tile_dir = dir.path().join("tile");
    let globals_dir = dir.path().join("globals");
    write_corpus(&tile_dir, &globals_dir);

    let config = base_config(&tile_dir, &globals_dir);
    config.validate().expect("config should be valid");

    let mut runtime = Runtime::<tilegraph::kernels::bfs::Bfs>::open(&config).expect("open should succeed");
    let rows = runtime.run(&config).expect("run should succeed");

    assert_eq!(rows.len(), 4);
    // Ascending dense id order, i.e. ascending original id here too since
    // the corpus maps them 1:1 in order.
    let orig_ids: Vec<u64> = rows.iter().map(|r| r.orig_id).collect();
    assert_eq!(orig_ids, vec![100, 200, 300, 400]);

    for row in &rows {
        if row.orig_id == 100 {
            assert_eq!(row.value, 0, "source vertex must settle at distance 0");
        } else {
            assert_eq!(row.value, UNREACHED, "edgeless graph never reaches any other vertex");
        }
    }
}
