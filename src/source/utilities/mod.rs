/// Node/worker topology lookup and shard splitting.
pub mod distributed;
