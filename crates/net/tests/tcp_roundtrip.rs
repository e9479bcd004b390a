//! Store calls over real loopback sockets

use std::sync::Arc;
use std::time::Duration;

use surf_core::{hash_bytes, Block, FileRecord};
use surf_net::{serve_block, serve_meta, RemoteBlockStore, RemoteMetaStore, TcpConnector};
use surf_store::{
    BlockStore, BlockStoreConnector, MemoryBlockStore, MemoryMetaStore, MetaStore, ShardedBlockStore,
    StoreError, UPDATE_REJECTED,
};
use tokio::net::TcpListener;

async fn spawn_block_service() -> (String, Arc<MemoryBlockStore>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let store = Arc::new(MemoryBlockStore::new());
    tokio::spawn(serve_block(listener, store.clone()));
    (addr, store)
}

async fn spawn_meta_service(block_addrs: Vec<String>) -> (String, Arc<MemoryMetaStore>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let store = Arc::new(MemoryMetaStore::new(block_addrs));
    tokio::spawn(serve_meta(listener, store.clone()));
    (addr, store)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_block_calls_round_trip() {
    let (addr, backing) = spawn_block_service().await;
    let remote = RemoteBlockStore::new(addr);

    let block = Block::new(vec![42u8; 100_000]);
    let digest = block.digest();
    assert!(remote.put_block(block.clone()).await.unwrap());
    assert!(backing.contains(&digest));

    assert_eq!(remote.get_block(&digest).await.unwrap(), block);

    let absent = hash_bytes(b"absent");
    assert!(matches!(
        remote.get_block(&absent).await,
        Err(StoreError::NotFound(d)) if d == absent
    ));
    assert_eq!(remote.has_blocks(&[absent, digest]).await.unwrap(), vec![digest]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_meta_calls_round_trip() {
    let (addr, backing) = spawn_meta_service(vec!["127.0.0.1:9001".into()]).await;
    let remote = RemoteMetaStore::new(addr);

    let record = FileRecord::new("a.txt", 1, vec![hash_bytes(b"a")]);
    assert_eq!(remote.update_file(record.clone()).await.unwrap(), 1);
    assert_eq!(
        remote.update_file(FileRecord::new("a.txt", 1, vec![])).await.unwrap(),
        UPDATE_REJECTED
    );
    assert_eq!(remote.update_file(FileRecord::tombstone("a.txt", 2)).await.unwrap(), 2);

    let map = remote.get_file_info_map().await.unwrap();
    assert_eq!(map["a.txt"], FileRecord::tombstone("a.txt", 2));
    assert_eq!(backing.version_of("a.txt"), Some(2));
    assert_eq!(
        remote.get_block_store_addrs().await.unwrap(),
        vec!["127.0.0.1:9001".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wrong_service_is_an_error() {
    let (addr, _backing) = spawn_block_service().await;
    let confused = RemoteMetaStore::new(addr);
    assert!(matches!(
        confused.get_file_info_map().await,
        Err(StoreError::Transport(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_service() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let remote = RemoteMetaStore::new(addr);
    let err = remote.get_file_info_map().await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable { .. }));
    assert!(err.is_transient());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_silent_service_times_out() {
    // Accepts connections but never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            if let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        }
    });

    let remote = RemoteBlockStore::new(addr).with_timeout(Duration::from_millis(100));
    assert!(matches!(
        remote.get_block(&hash_bytes(b"x")).await,
        Err(StoreError::Timeout(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sharded_store_over_tcp() {
    let mut addrs = Vec::new();
    let mut backings = Vec::new();
    for _ in 0..3 {
        let (addr, backing) = spawn_block_service().await;
        addrs.push(addr);
        backings.push(backing);
    }

    let sharded = ShardedBlockStore::from_directory(&addrs, &TcpConnector::default()).unwrap();
    let blocks: Vec<Block> = (0..30u32).map(|i| Block::new(i.to_le_bytes().to_vec())).collect();
    for block in &blocks {
        sharded.put_block(block.clone()).await.unwrap();
    }

    let total: usize = backings.iter().map(|b| b.len()).sum();
    assert_eq!(total, blocks.len());
    for block in &blocks {
        assert_eq!(sharded.get_block(&block.digest()).await.unwrap(), *block);
    }

    let connector = TcpConnector::new(Duration::from_millis(500));
    assert!(connector.connect(&addrs[0]).is_ok());
}
