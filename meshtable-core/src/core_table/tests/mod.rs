/*
    Scenario tests for core_table

    Test suite covering:
    - Multi-peer convergence over the in-process bus
    - Conflict rules between local and remote mutations
    - Uniform source selection for fetches
    - Snapshot persistence across restarts
    - Concurrent access to one table
*/
