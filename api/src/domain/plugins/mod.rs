pub mod installed_plugin;
