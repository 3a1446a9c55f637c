pub(super) const INSERT_MUTATION: &str = r#"
    INSERT INTO mutation_queue (
        sequence,
        id,
        mutation_type,
        entity_type,
        entity_id,
        payload,
        created_at,
        retry_count
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;

pub(super) const ADVANCE_QUEUE_CLOCK: &str = r#"
    INSERT INTO queue_clock (id, last_sequence, last_created_at)
    VALUES (1, ?1, ?2)
    ON CONFLICT(id) DO UPDATE SET
        last_sequence = MAX(last_sequence, excluded.last_sequence),
        last_created_at = MAX(last_created_at, excluded.last_created_at)
"#;

pub(super) const SELECT_QUEUE_CLOCK: &str = r#"
    SELECT last_sequence, last_created_at
    FROM queue_clock
    WHERE id = 1
"#;

pub(super) const SELECT_PENDING_MUTATIONS: &str = r#"
    SELECT sequence, id, mutation_type, entity_type, entity_id, payload, created_at, retry_count
    FROM mutation_queue
    ORDER BY created_at ASC, sequence ASC
"#;

pub(super) const SELECT_MUTATION_BY_ID: &str = r#"
    SELECT sequence, id, mutation_type, entity_type, entity_id, payload, created_at, retry_count
    FROM mutation_queue
    WHERE id = ?1
"#;

pub(super) const SELECT_MUTATIONS_REFERENCING: &str = r#"
    SELECT sequence, id, mutation_type, entity_type, entity_id, payload, created_at, retry_count
    FROM mutation_queue
    WHERE entity_id = ?1 OR instr(payload, ?1) > 0
"#;

pub(super) const DELETE_MUTATION: &str = r#"
    DELETE FROM mutation_queue
    WHERE id = ?1
"#;

pub(super) const INCREMENT_RETRY: &str = r#"
    UPDATE mutation_queue
    SET retry_count = retry_count + 1
    WHERE id = ?1
    RETURNING retry_count
"#;

pub(super) const UPDATE_MUTATION_REFERENCE: &str = r#"
    UPDATE mutation_queue
    SET entity_id = ?2,
        payload = ?3
    WHERE id = ?1
"#;

pub(super) const UPSERT_CACHE_SYNCED: &str = r#"
    INSERT INTO cache_metadata (cache_key, last_synced_at)
    VALUES (?1, ?2)
    ON CONFLICT(cache_key) DO UPDATE SET last_synced_at = excluded.last_synced_at
"#;

pub(super) const SELECT_CACHE_SYNCED: &str = r#"
    SELECT last_synced_at
    FROM cache_metadata
    WHERE cache_key = ?1
"#;
