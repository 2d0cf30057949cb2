pub mod bson;
pub mod catalog;
pub mod core;
pub mod engine;
pub mod query;

/*
┌─────────────────────────────────────────────────────────────────────────────┐
│                           MEMODB STRUCT ARCHITECTURE                         │
└─────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── ENGINE ─────────────────────────────────┐
│                                                                              │
│  ┌───────────────────────────────────────────────────────────────────────┐ │
│  │                            struct Engine                               │ │
│  │  ┌─────────────────────────────────────────────────────────────────┐ │ │
│  │  │ inner: Mutex<Inner>              // one lock, whole operation   │ │ │
│  │  │   dataset: Arc<Dataset>          // current published snapshot  │ │ │
│  │  │   store: Box<dyn Store>          // load once, store per write  │ │ │
│  │  │   queries: Box<dyn QueryEngine>  // match/update collaborator   │ │ │
│  │  └─────────────────────────────────────────────────────────────────┘ │ │
│  └───────────────────────────────────────────────────────────────────────┘ │
│                                                                              │
│  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────────────┐  │
│  │ trait Store      │  │ struct OpResult  │  │ trait QueryEngine        │  │
│  │ • load()         │  │ • matched        │  │ • filter / sort          │  │
│  │ • store(dataset) │  │ • modified       │  │ • apply / update         │  │
│  │ MemoryStore      │  │ • upserted       │  │ • extract / columns      │  │
│  │ FileStore        │  │ • errors         │  │ DefaultQueryEngine       │  │
│  └──────────────────┘  └──────────────────┘  └──────────────────────────┘  │
└──────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── CATALOG ────────────────────────────────┐
│                                                                              │
│  ┌──────────────────────┐   ┌─────────────────────────────────────────────┐│
│  │ struct Dataset       │──▶│ struct Namespace                            ││
│  │ • BTreeMap<Handle,   │   │ • docs: DocumentSet (ordered + identity map)││
│  │     Arc<Namespace>>  │   │ • indexes: BTreeMap<String, Index>          ││
│  └──────────────────────┘   └─────────────────────────────────────────────┘│
│                                                                              │
│  ┌──────────────────────┐   ┌─────────────────────────────────────────────┐│
│  │ struct Handle        │   │ struct Index                                ││
│  │ • db, coll           │   │ • columns (path, reverse), unique, partial  ││
│  └──────────────────────┘   │ • sorted entries: key tuple → documents     ││
│                             └─────────────────────────────────────────────┘│
└──────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────── VALUE MODEL ───────────────────────────────┐
│                                                                              │
│  ┌──────────────────────┐  ┌──────────────────┐  ┌──────────────────────┐  │
│  │ enum Value           │  │ struct Document  │  │ struct Path          │  │
│  │ • ranked variants    │  │ • ordered (k, v) │  │ • dotted segments    │  │
│  │ • total compare()    │  │ • order-keeping  │  │ • get/put/unset      │  │
│  └──────────────────────┘  │   set/remove     │  │ • array broadcast    │  │
│                            └──────────────────┘  └──────────────────────┘  │
│  ┌──────────────────────┐  ┌──────────────────┐                            │
│  │ struct ObjectId      │  │ struct PathNode  │                            │
│  │ • 12 bytes, hex      │  │ • segment trie   │                            │
│  └──────────────────────┘  └──────────────────┘                            │
└──────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── RELATIONSHIPS ──────────────────────────────┐
│                                                                              │
│  Engine ──clones──▶ Dataset ──clones──▶ Namespace ──indexes──▶ Index        │
│     │                                       │                               │
│     │                                       └──owns──▶ DocumentSet          │
│     │                                                      │                │
│     └──publishes after Store::store──▶ Arc<Dataset>        └─▶ Arc<Document>│
│                                                                              │
│  Every mutation: clone dataset → clone touched namespace → mutate →         │
│  store → publish. Documents are shared between snapshots through Arc and    │
│  never mutated after publication.                                           │
│                                                                              │
└──────────────────────────────────────────────────────────────────────────────┘
*/
