mod call_graph;
mod func;
mod module;
